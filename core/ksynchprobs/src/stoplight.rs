//! The intersection (stoplight) problem.
//!
//! Vehicles cross a four-way intersection split into four quadrants, one per
//! approach. Quadrant `d` is the one first entered by a vehicle approaching
//! from direction `d`; driving on, it moves into quadrant `(d + 3) % 4`, then
//! `(d + 2) % 4`:
//!
//! - a right turn occupies `d` only,
//! - going straight occupies `d`, then `(d + 3) % 4`,
//! - a left turn occupies `d`, `(d + 3) % 4`, then `(d + 2) % 4`.
//!
//! Each quadrant is a [`Lock`]. Vehicles lock hand over hand: the next
//! quadrant is acquired before the current one is released, so a vehicle
//! inside the intersection always holds one or two quadrants. At most
//! [`ADMISSION_PERMITS`] vehicles are inside at once.
//!
//! Every vehicle waits only for the quadrant following the one it holds, in
//! the same rotational sense. A cycle of waiting vehicles would therefore
//! need all four quadrants held by four vehicles, one more than admission
//! allows.

use core::fmt;

use kerrno::{KError, KResult, k_err_type};
use ksync::{Lock, Semaphore};
use log::{debug, trace};
use strum::{EnumIter, FromRepr};

/// Number of quadrants in the intersection.
pub const QUADRANTS: usize = 4;

/// Maximum number of vehicles inside the intersection at once.
pub const ADMISSION_PERMITS: usize = 3;

/// Identifier of a vehicle, chosen by the caller.
pub type VehicleId = u32;

/// Direction a vehicle approaches from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    /// The quadrant a vehicle from this direction enters first.
    pub const fn quadrant(self) -> Quadrant {
        Quadrant(self as u8)
    }
}

impl TryFrom<u32> for Direction {
    type Error = KError;

    fn try_from(value: u32) -> KResult<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_repr)
            .ok_or_else(|| k_err_type!(InvalidInput, "direction out of range"))
    }
}

/// One of the four quadrants, numbered like [`Direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quadrant(u8);

impl Quadrant {
    /// Index of the quadrant, in `0..QUADRANTS`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The quadrant a vehicle moves into when driving on from this one.
    pub const fn ahead(self) -> Self {
        Self((self.0 + 3) % QUADRANTS as u8)
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quadrant{}", self.0)
    }
}

/// What a vehicle does at the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Maneuver {
    Right,
    Straight,
    Left,
}

impl Maneuver {
    /// Number of quadrants the maneuver passes through.
    pub const fn steps(self) -> usize {
        match self {
            Self::Right => 1,
            Self::Straight => 2,
            Self::Left => 3,
        }
    }

    /// Quadrants occupied, in order, by a vehicle coming from `from`.
    pub const fn route(self, from: Direction) -> Route {
        Route {
            next: from.quadrant(),
            remaining: self.steps(),
        }
    }
}

/// Iterator over the quadrants of a maneuver, see [`Maneuver::route`].
#[derive(Debug, Clone)]
pub struct Route {
    next: Quadrant,
    remaining: usize,
}

impl Iterator for Route {
    type Item = Quadrant;

    fn next(&mut self) -> Option<Quadrant> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let quadrant = self.next;
        self.next = quadrant.ahead();
        Some(quadrant)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Route {}

/// Receives the progress of vehicles through the intersection.
///
/// Both callbacks run while the vehicle holds the quadrant concerned.
pub trait IntersectionObserver: Sync {
    /// `vehicle` has entered `quadrant`.
    fn in_quadrant(&self, quadrant: Quadrant, vehicle: VehicleId);
    /// `vehicle` is about to give up its last quadrant.
    fn leave_intersection(&self, vehicle: VehicleId);
}

/// The intersection controller.
pub struct Intersection<O> {
    quadrants: [Lock; QUADRANTS],
    admission: Semaphore,
    observer: O,
}

impl<O: IntersectionObserver> Intersection<O> {
    /// Sets up the quadrant locks and the admission semaphore.
    pub fn create(observer: O) -> KResult<Self> {
        let intersection = Self {
            quadrants: [
                Lock::create("quadrant0")?,
                Lock::create("quadrant1")?,
                Lock::create("quadrant2")?,
                Lock::create("quadrant3")?,
            ],
            admission: Semaphore::create("admission", ADMISSION_PERMITS)?,
            observer,
        };
        debug!("intersection ready, {} vehicles at a time", ADMISSION_PERMITS);
        Ok(intersection)
    }

    /// The observer given at creation.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    fn quadrant(&self, quadrant: Quadrant) -> &Lock {
        &self.quadrants[quadrant.index()]
    }

    /// Quadrants held by the current task, in index order.
    pub fn held_by_current(&self) -> impl Iterator<Item = Quadrant> + '_ {
        (0..QUADRANTS as u8)
            .map(Quadrant)
            .filter(|&q| self.quadrant(q).is_held_by_current())
    }

    /// Drives `vehicle` through the intersection.
    ///
    /// Blocks until admitted and until each quadrant on the route is free.
    pub fn cross(&self, from: Direction, maneuver: Maneuver, vehicle: VehicleId) {
        let permit = self.admission.acquire_guard();
        let mut held: Option<Quadrant> = None;
        for quadrant in maneuver.route(from) {
            self.quadrant(quadrant).acquire();
            trace!("vehicle {} in {}", vehicle, quadrant);
            self.observer.in_quadrant(quadrant, vehicle);
            if let Some(prev) = held.replace(quadrant) {
                self.quadrant(prev).release();
            }
        }
        self.observer.leave_intersection(vehicle);
        if let Some(last) = held {
            self.quadrant(last).release();
        }
        trace!("vehicle {} left the intersection", vehicle);
        drop(permit);
    }

    /// Turns right from `from`.
    pub fn turn_right(&self, from: Direction, vehicle: VehicleId) {
        self.cross(from, Maneuver::Right, vehicle);
    }

    /// Goes straight through from `from`.
    pub fn go_straight(&self, from: Direction, vehicle: VehicleId) {
        self.cross(from, Maneuver::Straight, vehicle);
    }

    /// Turns left from `from`.
    pub fn turn_left(&self, from: Direction, vehicle: VehicleId) {
        self.cross(from, Maneuver::Left, vehicle);
    }

    /// Tears the intersection down and hands back the observer.
    ///
    /// # Panics
    ///
    /// Panics if a vehicle is still inside.
    pub fn destroy(self) -> O {
        let Self {
            quadrants,
            admission,
            observer,
        } = self;
        for lock in quadrants {
            lock.destroy();
        }
        assert_eq!(
            admission.available_permits(),
            ADMISSION_PERMITS,
            "intersection destroyed with vehicles inside"
        );
        admission.destroy();
        debug!("intersection torn down");
        observer
    }
}

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex as StdMutex, Once, OnceLock, Weak},
};

use ksynchprobs::stoplight::{
    ADMISSION_PERMITS, Direction, Intersection, IntersectionObserver, Maneuver, QUADRANTS,
    Quadrant, VehicleId,
};
use ktask as thread;
use strum::IntoEnumIterator;

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        thread::init_scheduler();
    });
}

fn may_interrupt() {
    // simulate interrupts
    if fastrand::u8(0..3) == 0 {
        thread::yield_now();
    }
}

#[derive(Default)]
struct Traffic {
    occupant: [Option<VehicleId>; QUADRANTS],
    position: BTreeMap<VehicleId, Quadrant>,
    paths: BTreeMap<VehicleId, Vec<Quadrant>>,
    left: BTreeMap<VehicleId, usize>,
    max_inside: usize,
    max_held: usize,
}

/// Records where every vehicle is and checks nobody shares a quadrant.
///
/// Once attached, also checks the quadrant locks the vehicle really holds.
#[derive(Default)]
struct Recorder(StdMutex<Traffic>, OnceLock<Weak<Intersection<Recorder>>>);

impl Recorder {
    fn held(&self) -> Option<Vec<Quadrant>> {
        let intersection = self.1.get()?.upgrade()?;
        Some(intersection.held_by_current().collect())
    }
}

fn attached() -> Arc<Intersection<Recorder>> {
    let intersection = Arc::new(Intersection::create(Recorder::default()).unwrap());
    let _ = intersection.observer().1.set(Arc::downgrade(&intersection));
    intersection
}

impl IntersectionObserver for Recorder {
    fn in_quadrant(&self, quadrant: Quadrant, vehicle: VehicleId) {
        let held = self.held();
        let mut t = self.0.lock().unwrap();
        if let Some(held) = held {
            assert!(held.contains(&quadrant));
            assert!(held.len() <= 2, "vehicle {} holds {:?}", vehicle, held);
            t.max_held = t.max_held.max(held.len());
        }
        assert_eq!(
            t.occupant[quadrant.index()],
            None,
            "vehicle {} entered occupied {}",
            vehicle,
            quadrant
        );
        t.occupant[quadrant.index()] = Some(vehicle);
        if let Some(prev) = t.position.insert(vehicle, quadrant) {
            t.occupant[prev.index()] = None;
        }
        t.max_inside = t.max_inside.max(t.position.len());
        assert!(t.position.len() <= ADMISSION_PERMITS);
        t.paths.entry(vehicle).or_default().push(quadrant);
        drop(t);
        may_interrupt();
    }

    fn leave_intersection(&self, vehicle: VehicleId) {
        if let Some(held) = self.held() {
            assert_eq!(held.len(), 1, "vehicle {} leaves holding {:?}", vehicle, held);
        }
        let mut t = self.0.lock().unwrap();
        let last = t
            .position
            .remove(&vehicle)
            .expect("vehicle left without entering");
        assert_eq!(t.occupant[last.index()], Some(vehicle));
        t.occupant[last.index()] = None;
        *t.left.entry(vehicle).or_default() += 1;
    }
}

fn route(from: Direction, maneuver: Maneuver) -> Vec<Quadrant> {
    maneuver.route(from).collect()
}

#[test]
fn single_vehicle_each_maneuver() {
    init();

    let intersection = Intersection::create(Recorder::default()).unwrap();
    intersection.turn_right(Direction::East, 1);
    intersection.go_straight(Direction::South, 2);
    intersection.turn_left(Direction::West, 3);
    let recorder = intersection.destroy();

    let t = recorder.0.lock().unwrap();
    assert_eq!(t.paths[&1], route(Direction::East, Maneuver::Right));
    assert_eq!(t.paths[&2], route(Direction::South, Maneuver::Straight));
    assert_eq!(t.paths[&3], route(Direction::West, Maneuver::Left));
    assert!(t.occupant.iter().all(Option::is_none));
    assert_eq!(t.max_inside, 1);
}

#[test]
fn four_vehicles_straight() {
    init();

    let intersection = Arc::new(Intersection::create(Recorder::default()).unwrap());
    let handles: Vec<_> = Direction::iter()
        .map(|d| {
            let intersection = intersection.clone();
            thread::spawn(move || intersection.go_straight(d, d as VehicleId))
        })
        .collect();
    for h in handles {
        h.join();
    }

    let recorder = Arc::into_inner(intersection).unwrap().destroy();
    let t = recorder.0.lock().unwrap();
    for d in Direction::iter() {
        let v = d as VehicleId;
        let q = d as usize;
        let path: Vec<usize> = t.paths[&v].iter().map(|q| q.index()).collect();
        assert_eq!(path, [q, (q + 3) % 4]);
        assert_eq!(t.left[&v], 1);
    }
    assert!(t.max_inside <= ADMISSION_PERMITS);
}

#[test]
fn random_traffic() {
    init();

    const VEHICLES: u32 = 200;
    let intersection = attached();
    let maneuvers: Vec<Maneuver> = Maneuver::iter().collect();

    let handles: Vec<_> = (0..VEHICLES)
        .map(|v| {
            let intersection = intersection.clone();
            let from = Direction::try_from(fastrand::u32(0..4)).unwrap();
            let maneuver = maneuvers[fastrand::usize(..maneuvers.len())];
            thread::spawn(move || {
                may_interrupt();
                intersection.cross(from, maneuver, v);
                (from, maneuver)
            })
        })
        .collect();
    let plans: Vec<_> = handles.into_iter().map(|h| h.join()).collect();

    let recorder = Arc::into_inner(intersection).unwrap().destroy();
    let t = recorder.0.lock().unwrap();
    for (v, (from, maneuver)) in plans.into_iter().enumerate() {
        let v = v as VehicleId;
        assert_eq!(t.paths[&v], route(from, maneuver));
        assert_eq!(t.left[&v], 1);
    }
    assert!(t.position.is_empty());
    assert!(t.max_inside <= ADMISSION_PERMITS);
}

#[test]
fn left_turns_hold_at_most_two_quadrants() {
    init();

    const VEHICLES: u32 = 60;
    let intersection = attached();
    let handles: Vec<_> = (0..VEHICLES)
        .map(|v| {
            let intersection = intersection.clone();
            let from = Direction::try_from(v % 4).unwrap();
            thread::spawn(move || {
                may_interrupt();
                intersection.turn_left(from, v);
            })
        })
        .collect();
    for h in handles {
        h.join();
    }

    let recorder = Arc::into_inner(intersection).unwrap().destroy();
    let t = recorder.0.lock().unwrap();
    assert_eq!(t.max_held, 2);
    assert_eq!(t.left.len(), VEHICLES as usize);
    assert!(t.paths.values().all(|p| p.len() == 3));
}

#[test]
#[should_panic(expected = "destroyed while held")]
fn destroy_with_vehicle_inside_is_fatal() {
    init();

    struct Stuck;

    impl IntersectionObserver for Stuck {
        fn in_quadrant(&self, _: Quadrant, _: VehicleId) {}
        fn leave_intersection(&self, _: VehicleId) {
            panic!("breakdown");
        }
    }

    let intersection = Intersection::create(Stuck).unwrap();
    // The permit comes back on unwind, the quadrant does not.
    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        intersection.turn_right(Direction::North, 0)
    }));
    assert!(crashed.is_err());
    intersection.destroy();
}

//! The whale mating (rendezvous) problem.
//!
//! Mating takes three whales: a male, a female and a matchmaker. Each whale
//! arrives on its own and waits until one whale of each of the other two
//! roles is there; the three then leave together as a triad.
//!
//! All bookkeeping is under one [`Mutex`], with one [`Condvar`] per role.
//! Waiting whales of a role take numbered turns in arrival order. The whale
//! that completes a triad releases the oldest waiting whale of each other
//! role by advancing that role's release mark; a whale whose turn is not
//! below the mark goes back to sleep, so a later arrival can never leave in
//! place of one already waiting.

use kerrno::KResult;
use ksync::{Condvar, Lock, Mutex, destroy_mutex};
use log::{debug, trace};
use strum::{Display, EnumCount, EnumIter};

/// Identifier of a whale, chosen by the caller.
pub type WhaleId = u32;

/// Role of a whale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Male,
    Female,
    Matchmaker,
}

impl Role {
    const fn index(self) -> usize {
        self as usize
    }

    /// The two roles a whale of this role has to wait for.
    pub const fn partners(self) -> [Role; 2] {
        match self {
            Self::Male => [Self::Female, Self::Matchmaker],
            Self::Female => [Self::Male, Self::Matchmaker],
            Self::Matchmaker => [Self::Male, Self::Female],
        }
    }
}

/// Receives the progress of whales.
pub trait MatingObserver: Sync {
    /// Whale `id` of `role` has arrived.
    fn start(&self, role: Role, id: WhaleId);
    /// Whale `id` of `role` is leaving as part of a triad.
    ///
    /// Runs with the rendezvous lock held.
    fn end(&self, role: Role, id: WhaleId);
}

#[derive(Default)]
struct Pairing {
    queued: [u64; Role::COUNT],
    released: [u64; Role::COUNT],
    triads: usize,
}

impl Pairing {
    fn waiting(&self, role: Role) -> usize {
        (self.queued[role.index()] - self.released[role.index()]) as usize
    }
}

/// The rendezvous coordinator.
pub struct Rendezvous<O> {
    pairing: Mutex<Pairing>,
    arrivals: [Condvar; Role::COUNT],
    observer: O,
}

impl<O: MatingObserver> Rendezvous<O> {
    /// Sets up the rendezvous lock and one condition variable per role.
    pub fn create(observer: O) -> KResult<Self> {
        let rendezvous = Self {
            pairing: Mutex::const_new(Lock::create("whalemating")?, Pairing::default()),
            arrivals: [
                Condvar::create("male")?,
                Condvar::create("female")?,
                Condvar::create("matchmaker")?,
            ],
            observer,
        };
        debug!("whalemating ready");
        Ok(rendezvous)
    }

    /// The observer given at creation.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Whale `id` of `role` arrives and blocks until its triad is complete.
    pub fn arrive(&self, role: Role, id: WhaleId) {
        self.observer.start(role, id);
        let mut pairing = self.pairing.lock();
        let partners = role.partners();
        if partners.iter().all(|&p| pairing.waiting(p) > 0) {
            for partner in partners {
                pairing.released[partner.index()] += 1;
                // The released turn may belong to any sleeper of the role.
                self.arrivals[partner.index()].broadcast_guard(&pairing);
            }
            pairing.triads += 1;
            trace!("{} {} completed triad {}", role, id, pairing.triads);
        } else {
            let turn = pairing.queued[role.index()];
            pairing.queued[role.index()] += 1;
            self.arrivals[role.index()]
                .wait_while(&mut pairing, |p| p.released[role.index()] <= turn);
        }
        self.observer.end(role, id);
    }

    /// A male arrives.
    pub fn male(&self, id: WhaleId) {
        self.arrive(Role::Male, id);
    }

    /// A female arrives.
    pub fn female(&self, id: WhaleId) {
        self.arrive(Role::Female, id);
    }

    /// A matchmaker arrives.
    pub fn matchmaker(&self, id: WhaleId) {
        self.arrive(Role::Matchmaker, id);
    }

    /// Number of triads formed so far.
    pub fn triads(&self) -> usize {
        self.pairing.lock().triads
    }

    /// Number of whales of `role` waiting for partners.
    pub fn waiting(&self, role: Role) -> usize {
        self.pairing.lock().waiting(role)
    }

    /// Tears the rendezvous down and hands back the observer.
    ///
    /// # Panics
    ///
    /// Panics if a whale is still inside.
    pub fn destroy(self) -> O {
        let Self {
            pairing,
            arrivals,
            observer,
        } = self;
        let pairing = destroy_mutex(pairing);
        assert!(
            pairing.queued == pairing.released,
            "whalemating destroyed with whales inside"
        );
        for cv in arrivals {
            cv.destroy();
        }
        debug!("whalemating torn down after {} triads", pairing.triads);
        observer
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    struct Quiet;

    impl MatingObserver for Quiet {
        fn start(&self, _: Role, _: WhaleId) {}
        fn end(&self, _: Role, _: WhaleId) {}
    }

    #[test]
    fn partners_are_the_other_two() {
        for role in Role::iter() {
            let partners = role.partners();
            assert!(!partners.contains(&role));
            assert_ne!(partners[0], partners[1]);
        }
    }

    #[test]
    fn role_names() {
        assert_eq!(Role::Matchmaker.to_string(), "matchmaker");
        assert_eq!(Role::Male.to_string(), "male");
    }

    #[test]
    #[should_panic(expected = "lock whalemating destroyed while held")]
    fn destroy_while_locked_is_fatal() {
        ktask::init_scheduler();

        let rendezvous = Rendezvous::create(Quiet).unwrap();
        core::mem::forget(rendezvous.pairing.lock());
        rendezvous.destroy();
    }
}

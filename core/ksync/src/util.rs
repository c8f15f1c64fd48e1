//! Helpers shared by the primitives.

use alloc::{borrow::Cow, string::String};

use kerrno::{KResult, k_err_type};

/// Copies `name` into storage owned by a primitive.
///
/// The copy is reserved up front so that allocation failure surfaces as
/// [`KError::NoMemory`](kerrno::KError::NoMemory) instead of aborting.
pub(crate) fn dup_name(name: &str) -> KResult<Cow<'static, str>> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(name.len())
        .map_err(|_| k_err_type!(NoMemory, name))?;
    owned.push_str(name);
    Ok(Cow::Owned(owned))
}

#[cfg(test)]
mod tests {
    use alloc::borrow::Cow;

    use super::dup_name;

    #[test]
    fn dup_name_owns_a_copy() {
        let src = alloc::string::String::from("sem0");
        let name = dup_name(&src).unwrap();
        drop(src);
        assert!(matches!(name, Cow::Owned(_)));
        assert_eq!(name, "sem0");
    }

    #[test]
    fn dup_name_accepts_empty() {
        assert_eq!(dup_name("").unwrap(), "");
    }
}

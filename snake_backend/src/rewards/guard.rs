use candid::Principal;
use std::cell::RefCell;
use std::collections::BTreeSet;

thread_local! {
    static PENDING_OPERATIONS: RefCell<BTreeSet<Principal>> = const { RefCell::new(BTreeSet::new()) };
}

/// Prevents a caller from having two bridge operations in flight at once
/// (e.g. a claim racing its own retry, or record racing claim). RAII: the
/// slot frees itself when the guard drops, including on early `?` returns.
pub struct OperationGuard {
    caller: Principal,
}

impl OperationGuard {
    pub fn new(caller: Principal) -> Result<Self, String> {
        PENDING_OPERATIONS.with(|ops| {
            let mut ops = ops.borrow_mut();
            if ops.contains(&caller) {
                return Err("Operation already in progress for this caller".to_string());
            }
            ops.insert(caller);
            Ok(Self { caller })
        })
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        PENDING_OPERATIONS.with(|ops| {
            ops.borrow_mut().remove(&self.caller);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller() -> Principal {
        Principal::from_slice(&[9, 9, 9])
    }

    #[test]
    fn test_guard_blocks_second_operation() {
        let _guard = OperationGuard::new(caller()).unwrap();
        let second = OperationGuard::new(caller());
        assert!(second.is_err());
    }

    #[test]
    fn test_guard_frees_slot_on_drop() {
        {
            let _guard = OperationGuard::new(caller()).unwrap();
        }
        assert!(OperationGuard::new(caller()).is_ok());
    }

    #[test]
    fn test_guard_is_per_caller() {
        let _a = OperationGuard::new(Principal::from_slice(&[1])).unwrap();
        let b = OperationGuard::new(Principal::from_slice(&[2]));
        assert!(b.is_ok());
    }
}

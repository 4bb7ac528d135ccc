//! Transaction notices: a short, self-expiring feed of submitted contract
//! calls for the frontend toast stack.

use super::types::TxNotice;
use std::cell::RefCell;
use std::collections::VecDeque;

/// Most-recent notices kept.
const MAX_NOTICES: usize = 5;
/// Display duration before a notice expires on its own.
const NOTICE_TTL_NS: u64 = 10_000_000_000; // 10 seconds

thread_local! {
    static NOTICES: RefCell<VecDeque<TxNotice>> = RefCell::new(VecDeque::new());
    static NEXT_ID: RefCell<u64> = const { RefCell::new(1) };
}

fn expired(notice: &TxNotice, now_ns: u64) -> bool {
    now_ns.saturating_sub(notice.submitted_at_ns) >= NOTICE_TTL_NS
}

pub fn add(description: String, now_ns: u64) -> u64 {
    let id = NEXT_ID.with(|n| {
        let mut n = n.borrow_mut();
        let id = *n;
        *n += 1;
        id
    });

    NOTICES.with(|list| {
        let mut list = list.borrow_mut();
        list.retain(|n| !expired(n, now_ns));
        list.push_front(TxNotice {
            id,
            description,
            submitted_at_ns: now_ns,
        });
        list.truncate(MAX_NOTICES);
    });
    id
}

pub fn dismiss(id: u64) -> bool {
    NOTICES.with(|list| {
        let mut list = list.borrow_mut();
        let before = list.len();
        list.retain(|n| n.id != id);
        list.len() != before
    })
}

/// Live notices, newest first. Read-only: expired entries are filtered out of
/// the view and physically dropped on the next mutation.
pub fn list(now_ns: u64) -> Vec<TxNotice> {
    NOTICES.with(|list| {
        list.borrow()
            .iter()
            .filter(|n| !expired(n, now_ns))
            .cloned()
            .collect()
    })
}

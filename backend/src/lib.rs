//! DailyLeft budget engine.
//!
//! Resolves the user's spending cycle, aggregates logged expenses into it,
//! derives the daily allowance figures, and keeps everything current across
//! midnight rollovers and store mutations. The HTTP layer in [`io`] is a
//! thin adapter; all business rules live in [`domain`].

pub mod domain;
pub mod io;
pub mod storage;

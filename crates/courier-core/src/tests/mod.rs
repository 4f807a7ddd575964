//! Behavioural suites for the dispatch core.

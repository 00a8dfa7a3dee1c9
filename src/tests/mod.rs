//! Scenario test suite for the block layer
//!
//! Unit tests live next to the code they cover. The modules here exercise the
//! pieces together: type building, the mixins on constructed blocks, property
//! checks on field resolution, and the reference runtime end to end.

#[cfg(test)]
mod support;
#[cfg(test)]
mod integration;

//! Join engine
//!
//! Builds a hash index over a designated build side and streams the probe
//! side against it. INNER, LEFT, RIGHT and OUTER joins are supported.
//!
//! Null and absent keys bucket together and match each other. This differs
//! from SQL, where null never equals null.

mod engine;
mod index;

pub use engine::{join, JoinEngine, JoinSpec, JoinState, JoinType};
pub use index::{JoinIndex, JoinKey};

//! # Router Module
//!
//! Matches incoming requests to actions. The routing table is built once from
//! an [`ApiDefinition`](crate::design::ApiDefinition) and is read-only while
//! serving, so it can be shared across coroutines without locking.
//!
//! ## Matching
//!
//! 1. The path is split into segments and each segment is percent-decoded.
//! 2. A radix tree collects every action whose template fits the segments.
//! 3. Candidates declared for another method are discarded. If nothing is
//!    left the result is `405 Method Not Allowed` with the union of the
//!    path's methods; if nothing matched the path at all, `404`.
//! 4. Among the remaining candidates the template with the most literal
//!    segments wins (`/tasks/archived` beats `/tasks/{id}`). Equal-literal
//!    ties are rejected when the definition is built.
//!
//! ```rust,ignore
//! let router = Router::new(&api);
//! let m = router.route(&Method::GET, "/tasks/5")?;
//! assert_eq!(m.handler_name(), "tasks.show");
//! assert_eq!(m.get_path_param("id"), Some("5"));
//! ```

mod core;
mod radix;

pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};

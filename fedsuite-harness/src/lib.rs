//! Multi-instance federation test harness
//!
//! Sessions are obtained from an [`InstanceRegistry`]; fixtures are created
//! through the factory methods on [`Session`]; federated copies are looked
//! up with the resolver methods and awaited with a [`ConvergenceWaiter`].
//! Scenarios run through a [`ScenarioRunner`], which releases every follow
//! edge a scenario creates.

pub mod assertions;
pub mod factory;
pub mod registry;
pub mod resolver;
pub mod scenario;
pub mod session;
pub mod teardown;
pub mod waiter;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use fedsuite_core::{Error, Result};
pub use registry::InstanceRegistry;
pub use scenario::{
    Expectation, Scenario, ScenarioContext, ScenarioFilter, ScenarioFn, ScenarioResult,
    ScenarioRunner, SuiteResult, Verdict,
};
pub use session::Session;
pub use teardown::{FollowEdge, TeardownScope};
pub use waiter::ConvergenceWaiter;

/*!
# Symbion DevKit - fakes for patch agent tests

In-memory implementations of the agent's collaborators:
- `FakeHypervisor` for VM power and snapshot operations
- `FakeRemote` for SSH probes and commands
- `FakeNotifier` for report delivery
- `TestHarness` wiring them into a fleet run
*/

pub mod hypervisor_stub;
pub mod remote_stub;
pub mod test_utils;

pub use hypervisor_stub::{FailPoint, FakeHypervisor, HypervisorCall, CURRENT_MARKER};
pub use remote_stub::{FakeNotifier, FakeRemote, ProbePlan, RemoteCall};
pub use test_utils::{fqdn, init_tracing, TestHarness, TEST_DOMAIN};

/*!
# sixsim Simulator

Reference collaborators for the engine: the connectivity models, node
placement and a beaconing mote, tied together by [`DefaultScenario`].

## Key Components:
- **Connectivity:** static link matrices, synthetic (`Linear`,
  `FullyMeshed`) or read from a K7 trace.
- **Topology:** nodes on a line, or scattered in a square from a seed.
- **Mote:** beacons once per slotframe on a hopping channel.
*/

pub mod connectivity;
pub mod mote;
pub mod scenario;
pub mod topology;

pub use connectivity::{ConnectivityMatrix, LinkQuality, TraceError};
pub use mote::{BeaconMote, BeaconStats};
pub use scenario::DefaultScenario;

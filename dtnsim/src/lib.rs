/*!
# Delay-tolerant network scenario driver

Runs [`dtnsim_core`] networks over a seeded random contact process and
message workload, both described by a [`Scenario`].

```
use dtnsim::{FromSettings as _, Scenario, Settings, Simulation};
use dtnsim_core::RouterConfig;

let settings = Settings::parse(
    "Scenario.nrofHosts = 5
     Scenario.endTime = 2m
     DisasterRouter.powerThreshold = 0.2",
)
.unwrap();

let scenario = Scenario::from_settings(&settings).unwrap();
let config = RouterConfig::from_settings(&settings).unwrap();
let summary = Simulation::new(scenario, config).unwrap().run(|_| ()).unwrap();
assert!(summary.delivered <= summary.created);
```
*/

mod scenario;
mod settings;
mod simulation;

// convenient re-export of `dtnsim_core` core objects
pub use dtnsim_core::{HostId, Network, RouterConfig, SimTime};

pub use self::{
    scenario::{ContactProcess, Scenario, Workload},
    settings::{FromSettings, Settings},
    simulation::{Simulation, Summary},
};

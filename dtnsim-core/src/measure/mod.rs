mod bandwidth;
mod energy;
mod gauge;
mod size;

pub use self::{
    bandwidth::Bandwidth,
    energy::{Energy, EnergyConfig},
    gauge::Gauge,
    size::parse_size,
};

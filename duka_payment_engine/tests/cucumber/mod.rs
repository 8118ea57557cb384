mod payments_world;
mod steps;

pub use payments_world::PaymentsWorld;

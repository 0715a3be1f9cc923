// Collaborator surfaces: everything the engine needs from the outside world
// (assets on disk, the camera, the display, persistence, operator input) as
// traits, plus thin reference implementations.

pub mod assets;
pub mod capture;
pub mod display;
pub mod events;
pub mod persistence;

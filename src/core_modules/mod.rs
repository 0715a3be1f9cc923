pub mod canvas;
pub mod frame_processor;
pub mod frame_store;
pub mod navigation;
pub mod playback;
pub mod roi;
pub mod roi_engine;
pub mod rolling_plot;
pub mod stats;
pub mod taxonomy;

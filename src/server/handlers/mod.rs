pub mod anomalies;
pub mod model;
pub mod status;
pub mod websocket;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HazardError {
    #[error("model not ready: no inference backend loaded")]
    ModelNotReady,

    #[error("tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    TensorShape { expected: [usize; 3], actual: Vec<usize> },

    #[error("tensor data length mismatch: expected {expected} values, got {actual}")]
    TensorData { expected: usize, actual: usize },

    #[error("input size mismatch: model expects {expected:?}, got {actual:?}")]
    InputSize { expected: (u32, u32), actual: (u32, u32) },

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T, E = HazardError> = std::result::Result<T, E>;

#![forbid(unsafe_code)]

pub mod cancel;
pub mod contract;
pub mod error;
pub mod executor;
pub mod http;

pub use cancel::CancelToken;
pub use contract::{PracticeApi, VoiceStream};
pub use error::ApiError;
pub use executor::{ExecuteOptions, RequestExecutor, RequestView, RetryPolicy};
pub use http::{HttpConfig, HttpPracticeApi};

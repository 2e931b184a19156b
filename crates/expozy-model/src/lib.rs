//! # Expozy Model
//!
//! The generative-model adapter seam. The Worker depends
//! only on [`ModelAdapter`] and [`GenerationResult`]; [`HttpModelAdapter`]
//! is the production implementation and [`EchoAdapter`] backs tests and
//! local demos without a network call.

pub mod echo;
pub mod http;
pub mod result;
pub mod traits;

pub use echo::EchoAdapter;
pub use http::HttpModelAdapter;
pub use result::GenerationResult;
pub use traits::ModelAdapter;

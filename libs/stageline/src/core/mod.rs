// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod application;
pub mod error;
pub mod factories;
pub mod frames;
pub mod logging;
pub mod policies;
pub mod prelude;
pub mod pubsub;
pub mod runtime;
pub mod traits;

pub use application::{Application, ShutdownHandle};
pub use error::*;
pub use factories::*;
pub use frames::*;
pub use logging::Loggable;
pub use policies::*;
pub use pubsub::*;
pub use runtime::*;
pub use traits::*;

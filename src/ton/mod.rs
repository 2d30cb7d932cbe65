//! TON primitives
//!
//! Just enough of the cell model to build, sign and re-read wallet transfers:
//! cells, bag-of-cells codec, addresses, coin amounts and message layouts.

pub mod address;
pub mod boc;
pub mod cell;
pub mod coins;
pub mod message;

pub use address::{Address, AnyAddress, FriendlyAddress};
pub use cell::{Cell, CellBuilder, CellSlice};
pub use coins::Coins;
pub use message::{comment_body, parse_comment, ExternalMessage, InternalMessage, SendMode, StateInit};

//! DVB Application Information Table pipeline: the table model shared by
//! both decoders, the broadcast section reassembler and the XML AIT
//! decoder.

pub mod section;
pub mod table;
pub mod xml;

#[doc(inline)]
pub use self::{section::Ait, table::AitTable};

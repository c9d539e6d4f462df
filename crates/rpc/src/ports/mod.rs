//! Abstract interface between the dispatcher and the chain's own state.
//!
//! The dispatcher never reaches into a trie or sync loop directly; it asks
//! a [`ChainReader`] instead. What backs that trait (a live node, a
//! snapshot, a fixture for tests) is an external collaborator.

pub mod chain_reader;

pub use chain_reader::{BlockTransactions, BlockView, ChainReader, ChainReaderError, ReceiptView, TransactionView};

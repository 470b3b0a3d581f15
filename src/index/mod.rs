pub mod btree_page;
mod b_plus_tree;
mod index_iterator;
mod key;
mod key_comparator;

pub use b_plus_tree::BPlusTree;
pub use index_iterator::IndexIterator;
pub use key::{GenericKey, Storable};
pub use key_comparator::{BytewiseComparator, IntegerComparator, KeyComparator};

pub mod node_range;

pub mod auto_rotate;

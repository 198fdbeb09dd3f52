pub mod call_uid;
pub mod profile_node;

pub use call_uid::CallUid;
pub use profile_node::ProfileNode;

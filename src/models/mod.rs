mod visitor;

pub use visitor::VisitorRecord;

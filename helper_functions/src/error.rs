use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("committee index is out of bounds")]
    CommitteeIndexOutOfBounds,
}

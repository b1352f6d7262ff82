/// Handle used to confirm receipt of an inbound record.
///
/// The converter never calls it: it only attaches the handle to the
/// envelope's headers under [`ACKNOWLEDGMENT`](crate::headers::ACKNOWLEDGMENT)
/// so that handler code can confirm processing once it is done. Whether a
/// handle may be used more than once is up to the implementation.
pub trait Acknowledgment: std::fmt::Debug + Send + Sync {
    /// Confirm that the record has been processed.
    fn acknowledge(&self);
}

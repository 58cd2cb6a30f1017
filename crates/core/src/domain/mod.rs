pub mod icp;
pub mod message;
pub mod prospect;
pub mod sequence;

macro_rules! display_id {
    ($($id:ty),+ $(,)?) => {
        $(impl std::fmt::Display for $id {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        })+
    };
}

display_id!(
    icp::IcpConfigId,
    message::MessageId,
    prospect::ProspectId,
    sequence::SequenceId,
    sequence::StepId,
    sequence::EnrollmentId,
);

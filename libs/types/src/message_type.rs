//! Control Message Types
//!
//! Requests carry positive discriminants and their replies the negated value,
//! so `reply_type` is a sign flip and routing only needs the sign.
//! `Control_Abort` is the one reply without a request: the controller side
//! sends it in place of whatever reply a caller waits for once it can no
//! longer answer.

use crate::TypesError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive)]
pub enum MsgType {
    ControlBarrier = 33,
    ControlReplyBarrier = -33,
    ControlRegister = 34,
    ControlReplyRegister = -34,
    ControlClock = 35,
    ControlReplyClock = -35,
    ControlAbort = -1,
}

impl MsgType {
    /// Every control message type
    pub const ALL: [MsgType; 7] = [
        MsgType::ControlBarrier,
        MsgType::ControlReplyBarrier,
        MsgType::ControlRegister,
        MsgType::ControlReplyRegister,
        MsgType::ControlClock,
        MsgType::ControlReplyClock,
        MsgType::ControlAbort,
    ];

    /// Request types, handled by the controller
    pub const REQUESTS: [MsgType; 3] = [
        MsgType::ControlBarrier,
        MsgType::ControlRegister,
        MsgType::ControlClock,
    ];

    pub fn is_reply(self) -> bool {
        i32::from(self) < 0
    }

    pub fn is_request(self) -> bool {
        !self.is_reply()
    }

    /// Reply type answering this request, `None` for replies
    pub fn reply_type(self) -> Option<MsgType> {
        if self.is_reply() {
            return None;
        }
        MsgType::try_from(-i32::from(self)).ok()
    }

    /// Decode a raw discriminant
    pub fn from_raw(value: i32) -> Result<Self, TypesError> {
        MsgType::try_from(value).map_err(|_| TypesError::UnknownMessageType { value })
    }

    pub fn name(self) -> &'static str {
        match self {
            MsgType::ControlBarrier => "Control_Barrier",
            MsgType::ControlReplyBarrier => "Control_Reply_Barrier",
            MsgType::ControlRegister => "Control_Register",
            MsgType::ControlReplyRegister => "Control_Reply_Register",
            MsgType::ControlClock => "Control_Clock",
            MsgType::ControlReplyClock => "Control_Reply_Clock",
            MsgType::ControlAbort => "Control_Abort",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_pairs() {
        assert_eq!(
            MsgType::ControlRegister.reply_type(),
            Some(MsgType::ControlReplyRegister)
        );
        assert_eq!(
            MsgType::ControlBarrier.reply_type(),
            Some(MsgType::ControlReplyBarrier)
        );
        assert_eq!(MsgType::ControlClock.reply_type(), Some(MsgType::ControlReplyClock));
        assert_eq!(MsgType::ControlReplyClock.reply_type(), None);
    }

    #[test]
    fn test_abort_is_a_reply_without_request() {
        assert!(MsgType::ControlAbort.is_reply());
        assert_eq!(MsgType::ControlAbort.reply_type(), None);
        assert!(MsgType::REQUESTS
            .iter()
            .all(|request| request.reply_type() != Some(MsgType::ControlAbort)));
        assert_eq!(MsgType::from_raw(-1), Ok(MsgType::ControlAbort));
    }

    #[test]
    fn test_classification() {
        for msg_type in MsgType::REQUESTS {
            assert!(msg_type.is_request());
            assert!(msg_type.reply_type().unwrap().is_reply());
        }
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(MsgType::from_raw(-34), Ok(MsgType::ControlReplyRegister));
        assert_eq!(
            MsgType::from_raw(1),
            Err(TypesError::UnknownMessageType { value: 1 })
        );
    }
}

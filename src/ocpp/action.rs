//! Typed OCPP action names
//!
//! Incoming (CSMS → station) actions are dispatched through a typed enum so
//! the handler table is a match with a `NotImplemented` default instead of
//! string comparisons scattered through the code.

use std::fmt;
use std::str::FromStr;

/// CSMS-initiated actions the station can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomingAction {
    // Shared between 1.6 and 2.0.1
    Reset,
    UnlockConnector,
    ChangeAvailability,
    TriggerMessage,
    DataTransfer,
    ReserveNow,
    CancelReservation,
    SendLocalList,
    GetLocalListVersion,
    ClearCache,
    // 1.6
    RemoteStartTransaction,
    RemoteStopTransaction,
    ChangeConfiguration,
    GetConfiguration,
    // 2.0.1
    RequestStartTransaction,
    RequestStopTransaction,
    GetVariables,
    SetVariables,
    CertificateSigned,
    InstallCertificate,
    DeleteCertificate,
}

impl IncomingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reset => "Reset",
            Self::UnlockConnector => "UnlockConnector",
            Self::ChangeAvailability => "ChangeAvailability",
            Self::TriggerMessage => "TriggerMessage",
            Self::DataTransfer => "DataTransfer",
            Self::ReserveNow => "ReserveNow",
            Self::CancelReservation => "CancelReservation",
            Self::SendLocalList => "SendLocalList",
            Self::GetLocalListVersion => "GetLocalListVersion",
            Self::ClearCache => "ClearCache",
            Self::RemoteStartTransaction => "RemoteStartTransaction",
            Self::RemoteStopTransaction => "RemoteStopTransaction",
            Self::ChangeConfiguration => "ChangeConfiguration",
            Self::GetConfiguration => "GetConfiguration",
            Self::RequestStartTransaction => "RequestStartTransaction",
            Self::RequestStopTransaction => "RequestStopTransaction",
            Self::GetVariables => "GetVariables",
            Self::SetVariables => "SetVariables",
            Self::CertificateSigned => "CertificateSigned",
            Self::InstallCertificate => "InstallCertificate",
            Self::DeleteCertificate => "DeleteCertificate",
        }
    }
}

impl FromStr for IncomingAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Reset" => Self::Reset,
            "UnlockConnector" => Self::UnlockConnector,
            "ChangeAvailability" => Self::ChangeAvailability,
            "TriggerMessage" => Self::TriggerMessage,
            "DataTransfer" => Self::DataTransfer,
            "ReserveNow" => Self::ReserveNow,
            "CancelReservation" => Self::CancelReservation,
            "SendLocalList" => Self::SendLocalList,
            "GetLocalListVersion" => Self::GetLocalListVersion,
            "ClearCache" => Self::ClearCache,
            "RemoteStartTransaction" => Self::RemoteStartTransaction,
            "RemoteStopTransaction" => Self::RemoteStopTransaction,
            "ChangeConfiguration" => Self::ChangeConfiguration,
            "GetConfiguration" => Self::GetConfiguration,
            "RequestStartTransaction" => Self::RequestStartTransaction,
            "RequestStopTransaction" => Self::RequestStopTransaction,
            "GetVariables" => Self::GetVariables,
            "SetVariables" => Self::SetVariables,
            "CertificateSigned" => Self::CertificateSigned,
            "InstallCertificate" => Self::InstallCertificate,
            "DeleteCertificate" => Self::DeleteCertificate,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for IncomingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Station-initiated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutgoingAction {
    BootNotification,
    Heartbeat,
    Authorize,
    StatusNotification,
    MeterValues,
    // 1.6
    StartTransaction,
    StopTransaction,
    // 2.0.1
    TransactionEvent,
    SignCertificate,
    SecurityEventNotification,
    // Both
    DataTransfer,
    FirmwareStatusNotification,
}

impl OutgoingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BootNotification => "BootNotification",
            Self::Heartbeat => "Heartbeat",
            Self::Authorize => "Authorize",
            Self::StatusNotification => "StatusNotification",
            Self::MeterValues => "MeterValues",
            Self::StartTransaction => "StartTransaction",
            Self::StopTransaction => "StopTransaction",
            Self::TransactionEvent => "TransactionEvent",
            Self::SignCertificate => "SignCertificate",
            Self::SecurityEventNotification => "SecurityEventNotification",
            Self::DataTransfer => "DataTransfer",
            Self::FirmwareStatusNotification => "FirmwareStatusNotification",
        }
    }

    /// Whether a CALL for this action may wait in the send queue while the
    /// socket is closed. BootNotification must always run against a live
    /// socket; heartbeats are meaningless after the fact and are dropped.
    pub fn is_queueable(&self) -> bool {
        !matches!(self, Self::BootNotification | Self::Heartbeat)
    }
}

impl fmt::Display for OutgoingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_roundtrip() {
        for action in [
            IncomingAction::Reset,
            IncomingAction::GetVariables,
            IncomingAction::RemoteStopTransaction,
        ] {
            assert_eq!(action.as_str().parse::<IncomingAction>(), Ok(action));
        }
        assert!("NoSuchAction".parse::<IncomingAction>().is_err());
    }

    #[test]
    fn boot_notification_is_never_queueable() {
        assert!(!OutgoingAction::BootNotification.is_queueable());
        assert!(OutgoingAction::TransactionEvent.is_queueable());
        assert!(OutgoingAction::StopTransaction.is_queueable());
    }
}

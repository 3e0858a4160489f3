//! Invitation URLs
//!
//! An invitation travels as base64url JSON in one query parameter:
//! - `oob` - out-of-band invitation
//! - `c_i` - legacy connection invitation
//! - `d_m` - legacy connectionless message with a `~service` decorator
//!
//! Exactly one of them must be present. Legacy payloads are upgraded to the
//! out-of-band representation on parse.

use crate::error::{OutOfBandError, Result};
use crate::invitation::OutOfBandInvitation;
use crate::legacy::{convert_connectionless_to_oob, convert_to_oob_invitation, ConnectionInvitation};
use crate::messages::{decode_base64_json, encode_base64_json, AgentMessage};
use ::url::Url;

/// Query parameter of out-of-band invitations
pub const OOB_PARAM: &str = "oob";

/// Query parameter of legacy connection invitations
pub const CONNECTION_INVITATION_PARAM: &str = "c_i";

/// Query parameter of legacy connectionless messages
pub const CONNECTIONLESS_MESSAGE_PARAM: &str = "d_m";

/// Parse an invitation URL into an out-of-band invitation
pub fn parse_invitation(invitation_url: &str) -> Result<OutOfBandInvitation> {
    let parsed = Url::parse(invitation_url).map_err(|e| {
        OutOfBandError::invalid_invitation(format!("'{invitation_url}' is not a URL: {e}"))
    })?;

    let markers: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            key == OOB_PARAM || key == CONNECTION_INVITATION_PARAM || key == CONNECTIONLESS_MESSAGE_PARAM
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let (param, payload) = match markers.as_slice() {
        [single] => single,
        [] => {
            return Err(OutOfBandError::invalid_invitation(format!(
                "'{invitation_url}' has none of the '{OOB_PARAM}', '{CONNECTION_INVITATION_PARAM}' or '{CONNECTIONLESS_MESSAGE_PARAM}' parameters"
            )))
        }
        _ => {
            return Err(OutOfBandError::invalid_invitation(format!(
                "'{invitation_url}' has more than one invitation parameter"
            )))
        }
    };

    let decode_error =
        |e: OutOfBandError| OutOfBandError::invalid_invitation(format!("'{param}' payload: {e}"));

    match param.as_str() {
        OOB_PARAM => decode_base64_json::<OutOfBandInvitation>(payload).map_err(decode_error),
        CONNECTION_INVITATION_PARAM => {
            let legacy: ConnectionInvitation =
                decode_base64_json(payload).map_err(decode_error)?;
            convert_to_oob_invitation(&legacy)
        }
        _ => {
            let message: AgentMessage = decode_base64_json(payload).map_err(decode_error)?;
            convert_connectionless_to_oob(message)
        }
    }
}

fn append_payload(domain: &str, param: &str, payload: String) -> Result<String> {
    let mut url = Url::parse(domain).map_err(|e| {
        OutOfBandError::configuration(format!("invalid invitation domain '{domain}': {e}"))
    })?;
    url.query_pairs_mut().append_pair(param, &payload);
    Ok(url.to_string())
}

/// Encode an out-of-band invitation as `<domain>?oob=<payload>`
pub fn encode_invitation_url(domain: &str, invitation: &OutOfBandInvitation) -> Result<String> {
    append_payload(domain, OOB_PARAM, encode_base64_json(invitation)?)
}

/// Encode a legacy connection invitation as `<domain>?c_i=<payload>`
pub fn encode_legacy_invitation_url(domain: &str, invitation: &ConnectionInvitation) -> Result<String> {
    append_payload(domain, CONNECTION_INVITATION_PARAM, encode_base64_json(invitation)?)
}

/// Encode a connectionless message as `<domain>?d_m=<payload>`
pub fn encode_connectionless_url(domain: &str, message: &AgentMessage) -> Result<String> {
    append_payload(domain, CONNECTIONLESS_MESSAGE_PARAM, encode_base64_json(message)?)
}

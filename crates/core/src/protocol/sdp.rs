//! SDP (Session Description Protocol) generation (RFC 8866).
//!
//! Produces the DESCRIBE body for a set of medias:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=<user> <sess-id> <sess-ver> IN IP4 <addr>  ← origin
//! s=<session-name>                             ← session name
//! c=IN IP4 <addr>                              ← connection address
//! t=0 0                                        ← timing (live stream)
//! a=tool:rtsp-interleaved                      ← software (§6)
//! a=sendonly                                   ← direction (§6)
//! m=video 0 RTP/AVP 96                         ← one block per media
//! a=rtpmap:96 H264/90000
//! a=fmtp:96 packetization-mode=1
//! a=control:track1
//! ```

use crate::media::Media;

/// Session-level fields of a description.
#[derive(Debug, Clone)]
pub struct SdpOrigin {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub session_name: String,
    /// Address advertised in `o=` and `c=`.
    pub address: String,
}

impl Default for SdpOrigin {
    fn default() -> Self {
        Self {
            username: "-".to_string(),
            session_id: "0".to_string(),
            session_version: "0".to_string(),
            session_name: "Stream".to_string(),
            address: "0.0.0.0".to_string(),
        }
    }
}

/// Generate a session description listing `medias` in order.
pub fn generate_sdp<'a>(origin: &SdpOrigin, medias: impl IntoIterator<Item = &'a Media>) -> String {
    let mut sdp: Vec<String> = vec![
        "v=0".to_string(),
        format!(
            "o={} {} {} IN IP4 {}",
            origin.username, origin.session_id, origin.session_version, origin.address
        ),
        format!("s={}", origin.session_name),
        format!("c=IN IP4 {}", origin.address),
        "t=0 0".to_string(),
        "a=tool:rtsp-interleaved".to_string(),
        "a=sendonly".to_string(),
    ];

    for media in medias {
        let pts: Vec<String> = media
            .formats
            .iter()
            .map(|f| f.payload_type().to_string())
            .collect();
        sdp.push(format!("m={} 0 RTP/AVP {}", media.kind, pts.join(" ")));
        for format in &media.formats {
            sdp.extend(format.sdp_attributes());
        }
        sdp.push(format!("a=control:{}", media.control));
    }

    tracing::debug!("SDP: {}", sdp.join("\r\n"));

    format!("{}\r\n", sdp.join("\r\n"))
}

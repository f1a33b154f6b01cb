/// Lower transport requested for RTP delivery (RFC 2326 §12.39).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerTransport {
    /// Interleaved into the RTSP connection (`RTP/AVP/TCP`).
    Tcp,
    /// Separate datagrams (`RTP/AVP` or `RTP/AVP/UDP`).
    Udp,
}

/// `interleaved=RTP-RTCP` channel ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPair {
    pub rtp_channel: u8,
    pub rtcp_channel: u8,
}

/// `client_port=RTP-RTCP` port numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub rtp_port: u16,
    pub rtcp_port: u16,
}

/// Parsed client-side transport request from the RTSP `Transport` header.
///
/// ## Wire format examples
///
/// ```text
/// Transport: RTP/AVP/TCP;unicast;interleaved=0-1
/// Transport: RTP/AVP;unicast;client_port=8000-8001
/// ```
///
/// Only the first transport of a comma-separated list is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub lower: LowerTransport,
    pub unicast: bool,
    pub interleaved: Option<ChannelPair>,
    pub client_port: Option<PortPair>,
}

impl TransportConfig {
    /// Parse the `Transport` header value (RFC 2326 §12.39).
    ///
    /// ## Examples
    ///
    /// ```
    /// use rtsp::protocol::{LowerTransport, TransportConfig};
    ///
    /// let t = TransportConfig::parse("RTP/AVP/TCP;unicast;interleaved=0-1").unwrap();
    /// assert_eq!(t.lower, LowerTransport::Tcp);
    /// assert_eq!(t.interleaved.unwrap().rtcp_channel, 1);
    ///
    /// let t = TransportConfig::parse("RTP/AVP;unicast;client_port=8000-8001").unwrap();
    /// assert_eq!(t.lower, LowerTransport::Udp);
    /// assert_eq!(t.client_port.unwrap().rtp_port, 8000);
    ///
    /// assert!(TransportConfig::parse("RAW/RAW/UDP;unicast").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        let first = header.split(',').next()?;
        let mut parts = first.split(';').map(str::trim);

        let lower = match parts.next()?.to_ascii_uppercase().as_str() {
            "RTP/AVP" | "RTP/AVP/UDP" => LowerTransport::Udp,
            "RTP/AVP/TCP" => LowerTransport::Tcp,
            _ => return None,
        };

        let mut config = TransportConfig {
            lower,
            unicast: true,
            interleaved: None,
            client_port: None,
        };

        for part in parts {
            if part.eq_ignore_ascii_case("multicast") {
                config.unicast = false;
            } else if part.eq_ignore_ascii_case("unicast") {
                config.unicast = true;
            } else if let Some(channels) = part.strip_prefix("interleaved=") {
                let (rtp_channel, rtcp_channel) = parse_pair::<u8>(channels)?;
                config.interleaved = Some(ChannelPair {
                    rtp_channel,
                    rtcp_channel,
                });
            } else if let Some(ports) = part.strip_prefix("client_port=") {
                let (rtp_port, rtcp_port) = parse_pair::<u16>(ports)?;
                config.client_port = Some(PortPair {
                    rtp_port,
                    rtcp_port,
                });
            }
        }

        Some(config)
    }
}

/// `a-b`, or a lone `a` meaning `a-(a+1)`.
fn parse_pair<T>(value: &str) -> Option<(T, T)>
where
    T: std::str::FromStr + Copy + TryFrom<u32>,
    u32: From<T>,
{
    match value.split_once('-') {
        Some((a, b)) => Some((a.trim().parse().ok()?, b.trim().parse().ok()?)),
        None => {
            let a: T = value.trim().parse().ok()?;
            let b = T::try_from(u32::from(a) + 1).ok()?;
            Some((a, b))
        }
    }
}

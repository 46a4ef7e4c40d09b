// # SOAP helpers
//
// Request envelopes and response field extraction for TR-064 actions.
//
// TR-064 responses are flat: every output argument is a direct child of
// the `<u:ActionResponse>` element with text content only. Fields are
// therefore read by tag name, without a general XML parser.

use linewatch_core::{Error, Result};

/// A TR-064 service: its URN and control endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub service_type: &'static str,
    pub control_url: &'static str,
}

pub const WAN_IP_CONNECTION: Service = Service {
    service_type: "urn:dslforum-org:service:WANIPConnection:1",
    control_url: "/upnp/control/wanipconnection1",
};

pub const WAN_COMMON_INTERFACE_CONFIG: Service = Service {
    service_type: "urn:dslforum-org:service:WANCommonInterfaceConfig:1",
    control_url: "/upnp/control/wancommonifconfig1",
};

pub const DEVICE_INFO: Service = Service {
    service_type: "urn:dslforum-org:service:DeviceInfo:1",
    control_url: "/upnp/control/deviceinfo",
};

/// Build the envelope for an action without input arguments
pub fn envelope(service: Service, action: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
            r#"<s:Body><u:{action} xmlns:u="{service_type}"></u:{action}></s:Body>"#,
            r#"</s:Envelope>"#
        ),
        action = action,
        service_type = service.service_type,
    )
}

/// Value of the `SOAPACTION` header
pub fn soap_action(service: Service, action: &str) -> String {
    format!("\"{}#{}\"", service.service_type, action)
}

/// Parsed action response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    body: String,
}

impl ActionResponse {
    /// Wrap a response body, turning SOAP faults into errors
    pub fn parse(action: &str, body: String) -> Result<Self> {
        if body.contains("Fault>") {
            let code = extract_field(&body, "errorCode").unwrap_or_default();
            let description = extract_field(&body, "errorDescription")
                .or_else(|| extract_field(&body, "faultstring"))
                .unwrap_or_else(|| "unknown fault".to_string());
            return Err(Error::router(format!(
                "{} returned SOAP fault {}: {}",
                action, code, description
            )));
        }

        if !body.contains(&format!("{}Response", action)) {
            return Err(Error::parse(format!("{} response missing body", action)));
        }

        Ok(Self { body })
    }

    /// An optional output argument, unescaped
    pub fn get(&self, name: &str) -> Option<String> {
        extract_field(&self.body, name)
    }

    /// A required output argument, unescaped
    pub fn require(&self, name: &str) -> Result<String> {
        self.get(name)
            .ok_or_else(|| Error::parse(format!("Response has no {} field", name)))
    }
}

/// Text content of the first `<name>` element, or `""` for `<name/>`
///
/// Tags may carry a namespace prefix.
pub fn extract_field(body: &str, name: &str) -> Option<String> {
    let mut search = body;

    while let Some(lt) = search.find('<') {
        let rest = &search[lt + 1..];
        let tag_end = rest.find('>')?;
        let tag = &rest[..tag_end];
        search = &rest[tag_end + 1..];

        if tag.starts_with('/') || tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }

        let self_closing = tag.ends_with('/');
        let tag_name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default();
        let local = tag_name.rsplit(':').next().unwrap_or(tag_name);
        if local != name {
            continue;
        }

        if self_closing {
            return Some(String::new());
        }

        let close = format!("</{}>", tag_name);
        let end = search.find(&close)?;
        return Some(unescape(&search[..end]));
    }

    None
}

/// Resolve the five predefined XML entities and numeric character references
///
/// Unknown entities are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric(entity),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_numeric(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

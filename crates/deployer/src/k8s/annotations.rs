//! Parsing of pod network annotations captured through the exec probe.
//!
//! The probe dumps `/etc/podnetinfo/annotations`, a downward-API file whose
//! values are escaped JSON blobs written by the network device plugin. The
//! transport adds another layer of escaping on top, so instead of a real
//! JSON parse the text is scrubbed down to bare `key:value` runs and scanned
//! for known marker substrings. Parsing is best-effort by contract: the
//! remote workload does not guarantee the format, so no match means an empty
//! result, never an error.

use std::collections::BTreeMap;

/// Marker for virtual socket entries (memif / vhost-user).
const SOCKET_MARKER: &str = "socketfile";
/// Marker for SR-IOV physical interface identifiers.
const INTERFACE_MARKER: &str = "interface";
/// Marker for SR-IOV logical interface names.
const NAME_MARKER: &str = "name";

/// Network attachment metadata extracted from a pod's annotation dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NetworkAttachment {
    /// Ordered virtual socket paths, in encounter order.
    SocketList(Vec<String>),
    /// Logical interface name to physical interface identifier.
    InterfaceMap(BTreeMap<String, String>),
}

impl NetworkAttachment {
    /// Parse virtual socket paths out of a raw annotation dump.
    pub(crate) fn sockets(raw: &str) -> Self {
        Self::SocketList(parse_virtual_sockets(raw))
    }

    /// Parse the SR-IOV interface mapping out of a raw annotation dump.
    pub(crate) fn interfaces(raw: &str) -> Self {
        Self::InterfaceMap(parse_sriov_interfaces(raw))
    }
}

/// Strip structural noise from the captured annotation text.
///
/// Removes literal `\n` escape pairs first (dropping only the backslash
/// would leave a stray `n` glued to the neighbouring token), then quotes,
/// raw newlines, remaining backslashes, brackets and braces, and finally
/// every run of whitespace.
fn scrub(raw: &str) -> String {
    raw.replace("\\n", "")
        .chars()
        .filter(|c| !matches!(c, '"' | '\\' | '[' | ']' | '{' | '}') && !c.is_whitespace())
        .collect()
}

/// Slice off a `marker:` prefix, tolerating fragments too short to carry one.
fn after_marker<'a>(fragment: &'a str, marker: &str) -> &'a str {
    fragment.get(marker.len() + 1..).unwrap_or("")
}

/// Extract virtual socket paths (memif or vhost-user) from a raw dump.
///
/// The scrubbed text is split on `=`, which leaves annotation values bled
/// into the next annotation's key; fragments are therefore scanned for the
/// socket marker rather than treated as clean pairs.
pub(crate) fn parse_virtual_sockets(raw: &str) -> Vec<String> {
    let scrubbed = scrub(raw);
    let mut socket_files = Vec::new();
    for fragment in scrubbed.split('=') {
        if !fragment.contains(SOCKET_MARKER) {
            continue;
        }
        for sub in fragment.split(',') {
            if sub.contains(SOCKET_MARKER) {
                socket_files.push(after_marker(sub, SOCKET_MARKER).to_string());
            }
        }
    }
    socket_files
}

/// Extract the SR-IOV logical-name to physical-interface mapping.
///
/// Identifiers and names are collected into two parallel lists in encounter
/// order and zipped positionally. If the lists come out with different
/// lengths the mapping is built only up to the shorter one; nothing guards
/// against the remote output interleaving the two in a different relative
/// order per entry (a known fragility of the annotation format).
pub(crate) fn parse_sriov_interfaces(raw: &str) -> BTreeMap<String, String> {
    let scrubbed = scrub(raw);
    let mut names = Vec::new();
    let mut interfaces = Vec::new();
    for fragment in scrubbed.split('=') {
        if !fragment.contains(INTERFACE_MARKER) {
            continue;
        }
        for sub in fragment.split(',') {
            if sub.contains(INTERFACE_MARKER) {
                interfaces.push(after_marker(sub, INTERFACE_MARKER).to_string());
            } else if sub.contains(NAME_MARKER) {
                names.push(after_marker(sub, NAME_MARKER).to_string());
            }
        }
    }
    names.into_iter().zip(interfaces).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_removes_escapes_and_whitespace() {
        let raw = "{\\n  \\\"socketfile\\\": \\\"/tmp/a.sock\\\"\\n}\n";
        assert_eq!(scrub(raw), "socketfile:/tmp/a.sock");
    }

    #[test]
    fn scrub_does_not_leave_stray_n_from_escape_pairs() {
        assert_eq!(scrub("/tmp/a.sock\\n,"), "/tmp/a.sock,");
    }

    #[test]
    fn parse_sockets_from_escaped_blob() {
        let raw = "userspace/configuration-data=\"[{\\n  \\\"socketfile\\\": \\\"/tmp/a.sock\\\",\\n  \\\"socketfile\\\": \\\"/tmp/b.sock\\\"\\n}]\"\n";
        assert_eq!(
            parse_virtual_sockets(raw),
            vec!["/tmp/a.sock".to_string(), "/tmp/b.sock".to_string()]
        );
    }

    #[test]
    fn parse_sockets_no_match_is_empty() {
        assert!(parse_virtual_sockets("kubernetes.io/config.seen=2021").is_empty());
        assert!(parse_virtual_sockets("").is_empty());
    }

    #[test]
    fn parse_interfaces_from_escaped_blob() {
        let raw = "k8s.v1.cni.cncf.io/network-status=\"[{\\n  \\\"name\\\": \\\"net1\\\",\\n  \\\"interface\\\": \\\"eth0\\\"\\n},\\n{\\n  \\\"name\\\": \\\"net2\\\",\\n  \\\"interface\\\": \\\"eth1\\\"\\n}]\"\n";
        let map = parse_sriov_interfaces(raw);
        assert_eq!(map.get("net1").map(String::as_str), Some("eth0"));
        assert_eq!(map.get("net2").map(String::as_str), Some("eth1"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn parse_interfaces_misaligned_lists_truncate_to_shorter() {
        // Two names but only one interface identifier: the map stops at the
        // shorter list instead of erroring.
        let raw = "status=\"{\\\"name\\\": \\\"net1\\\", \\\"interface\\\": \\\"eth0\\\", \\\"name\\\": \\\"net2\\\"}\"";
        let map = parse_sriov_interfaces(raw);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("net1").map(String::as_str), Some("eth0"));
    }

    #[test]
    fn parse_interfaces_no_match_is_empty() {
        assert!(parse_sriov_interfaces("kubernetes.io/config.seen=2021").is_empty());
    }

    #[test]
    fn attachment_constructors() {
        let raw = "data=\"{\\\"socketfile\\\": \\\"/run/memif.sock\\\"}\"";
        assert_eq!(
            NetworkAttachment::sockets(raw),
            NetworkAttachment::SocketList(vec!["/run/memif.sock".to_string()])
        );
        assert_eq!(
            NetworkAttachment::interfaces("no markers here"),
            NetworkAttachment::InterfaceMap(BTreeMap::new())
        );
    }
}

//! Well-known service names by port and protocol.
//!
//! Used as the heuristic guess when a banner does not match any signature,
//! and for the service column of ports that were never fingerprinted.

use crate::types::Protocol;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Services registered on both TCP and UDP, or commonly seen on either.
const SHARED: &[(u16, &str)] = &[
    (53, "domain"),
    (88, "kerberos"),
    (389, "ldap"),
    (443, "https"),
    (464, "kpasswd"),
    (3478, "stun"),
];

const TCP_ONLY: &[(u16, &str)] = &[
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (79, "finger"),
    (80, "http"),
    (110, "pop3"),
    (111, "rpcbind"),
    (113, "ident"),
    (119, "nntp"),
    (135, "msrpc"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (179, "bgp"),
    (445, "microsoft-ds"),
    (465, "smtps"),
    (513, "login"),
    (514, "shell"),
    (515, "printer"),
    (548, "afp"),
    (554, "rtsp"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (873, "rsync"),
    (990, "ftps"),
    (993, "imaps"),
    (995, "pop3s"),
    (1080, "socks"),
    (1433, "ms-sql-s"),
    (1521, "oracle"),
    (1723, "pptp"),
    (2049, "nfs"),
    (2375, "docker"),
    (2376, "docker-tls"),
    (3000, "http-alt"),
    (3128, "squid-http"),
    (3306, "mysql"),
    (3389, "ms-wbt-server"),
    (5000, "upnp"),
    (5432, "postgresql"),
    (5672, "amqp"),
    (5900, "vnc"),
    (5985, "wsman"),
    (6379, "redis"),
    (6443, "kubernetes-api"),
    (8000, "http-alt"),
    (8008, "http"),
    (8080, "http-proxy"),
    (8443, "https-alt"),
    (8888, "http-alt"),
    (9000, "cslistener"),
    (9090, "zeus-admin"),
    (9200, "elasticsearch"),
    (9418, "git"),
    (11211, "memcached"),
    (27017, "mongodb"),
];

const UDP_ONLY: &[(u16, &str)] = &[
    (67, "dhcps"),
    (68, "dhcpc"),
    (69, "tftp"),
    (123, "ntp"),
    (137, "netbios-ns"),
    (138, "netbios-dgm"),
    (161, "snmp"),
    (162, "snmptrap"),
    (500, "isakmp"),
    (514, "syslog"),
    (520, "route"),
    (1194, "openvpn"),
    (1812, "radius"),
    (1900, "upnp"),
    (4500, "nat-t-ike"),
    (5060, "sip"),
    (5353, "mdns"),
    (11211, "memcached"),
];

fn table(protocol_specific: &[(u16, &'static str)]) -> HashMap<u16, &'static str> {
    SHARED
        .iter()
        .chain(protocol_specific)
        .copied()
        .collect()
}

static TCP_SERVICES: LazyLock<HashMap<u16, &'static str>> = LazyLock::new(|| table(TCP_ONLY));
static UDP_SERVICES: LazyLock<HashMap<u16, &'static str>> = LazyLock::new(|| table(UDP_ONLY));

/// Get the registered service name for a port.
pub fn service_name(port: u16, protocol: Protocol) -> Option<&'static str> {
    match protocol {
        Protocol::Tcp => TCP_SERVICES.get(&port).copied(),
        Protocol::Udp => UDP_SERVICES.get(&port).copied(),
    }
}

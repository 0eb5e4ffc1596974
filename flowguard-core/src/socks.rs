//! SOCKS5 request-header stripping (RFC 1928), used to look for BitTorrent
//! traffic tunneled through a SOCKS5 proxy.

const VERSION_5: u8 = 0x05;
const RESERVED: u8 = 0x00;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Strips a SOCKS5 request header (`VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT`)
/// from the front of `payload`, returning the remainder. Returns `None` if
/// the header is malformed or the payload is too short.
///
/// Never allocates.
pub fn unwrap_socks5(payload: &[u8]) -> Option<&[u8]> {
    let &[ver, cmd, rsv, atyp, ref rest @ ..] = payload else { return None };
    if ver != VERSION_5 || rsv != RESERVED || !(1..=3).contains(&cmd) {
        return None;
    }

    let addr_len = match atyp {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let &[len, ..] = rest else { return None };
            1 + usize::from(len)
        }
        _ => return None,
    };

    let header_len = addr_len.checked_add(2)?; // + DST.PORT
    if rest.len() < header_len {
        return None;
    }
    Some(&rest[header_len..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_ipv4_connect_request() {
        let mut req = vec![0x05, 0x01, 0x00, 0x01];
        req.extend_from_slice(&[1, 2, 3, 4]); // DST.ADDR
        req.extend_from_slice(&[0x1a, 0xe1]); // DST.PORT = 6881
        req.extend_from_slice(b"inner payload");

        let inner = unwrap_socks5(&req).expect("should unwrap");
        assert_eq!(inner, b"inner payload");
    }

    #[test]
    fn unwraps_domain_connect_request() {
        let domain = b"tracker.example.com";
        let mut req = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
        req.extend_from_slice(domain);
        req.extend_from_slice(&[0x00, 0x50]);
        req.extend_from_slice(b"payload");

        assert_eq!(unwrap_socks5(&req), Some(b"payload".as_slice()));
    }

    #[test]
    fn rejects_wrong_version() {
        let req = [0x04, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0, 80];
        assert_eq!(unwrap_socks5(&req), None);
    }

    #[test]
    fn rejects_truncated_header() {
        let req = [0x05, 0x01, 0x00, 0x01, 1, 2, 3];
        assert_eq!(unwrap_socks5(&req), None);
    }

    #[test]
    fn rejects_unknown_address_type() {
        let req = [0x05, 0x01, 0x00, 0x07, 1, 2, 3, 4, 0, 80];
        assert_eq!(unwrap_socks5(&req), None);
    }
}

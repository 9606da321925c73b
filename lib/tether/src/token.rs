use crate::payload::Payload;
use crate::shared::{ErrorType, NetworkError, NetworkResult};
use lumen::encoding::base64;

/// Total size of the connect token, public and private portions together.
pub const CONNECT_TOKEN_BYTES: usize = 2048;
/// Size of the encrypted private blob the client carries opaquely.
pub const PRIVATE_BLOB_BYTES: usize = 1024;
pub const NONCE_BYTES: usize = 24;
pub const KEY_BYTES: usize = 32;
pub const MAX_SERVER_ADDRESSES: u32 = 32;

const ADDRESS_TYPE_IPV4: u8 = 1;
const ADDRESS_TYPE_IPV6: u8 = 2;

/// One ranked server endpoint out of the token, decoded to a dialable host
/// string plus port.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

/// Public portion of the connect token. The private blob and the two session
/// keys are carried as opaque bytes; only the server can use them.
#[derive(Debug)]
pub struct ConnectToken {
    pub version: String,
    pub protocol_id: u64,
    pub created: u64,
    pub expires: u64,
    pub nonce: [u8; NONCE_BYTES],
    pub private_data: Vec<u8>,
    pub timeout: i32,
    pub addresses: Vec<ServerAddress>,
    pub client_to_server_key: [u8; KEY_BYTES],
    pub server_to_client_key: [u8; KEY_BYTES],
    /// The raw token bytes, retained for the authentication handshake.
    pub raw: Vec<u8>,
}

impl ConnectToken {
    /// Decode a token from its raw binary form. Anything other than exactly
    /// 2048 bytes is rejected before parsing begins.
    pub fn decode(input: &[u8]) -> NetworkResult<ConnectToken> {
        if input.len() != CONNECT_TOKEN_BYTES {
            return Err(NetworkError::Fatal(ErrorType::InvalidToken));
        }

        let mut payload = Payload::new(CONNECT_TOKEN_BYTES);
        payload.rebind(input.to_vec());

        let version = payload.read_string();
        if version.is_empty() {
            return Err(NetworkError::Fatal(ErrorType::InvalidToken));
        }

        let protocol_id = Self::field(payload.read_u64())?;
        let created = Self::field(payload.read_u64())?;
        let expires = Self::field(payload.read_u64())?;

        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(Self::field(payload.read(NONCE_BYTES))?);

        let private_data = Self::field(payload.read(PRIVATE_BLOB_BYTES))?.to_vec();
        let timeout = Self::field(payload.read_i32())?;

        let address_count = Self::field(payload.read_u32())?;
        if address_count == 0 || address_count > MAX_SERVER_ADDRESSES {
            return Err(NetworkError::Fatal(ErrorType::InvalidToken));
        }

        let mut addresses = Vec::with_capacity(address_count as usize);
        for _ in 0..address_count {
            addresses.push(Self::read_address(&mut payload)?);
        }

        let mut client_to_server_key = [0u8; KEY_BYTES];
        client_to_server_key.copy_from_slice(Self::field(payload.read(KEY_BYTES))?);

        let mut server_to_client_key = [0u8; KEY_BYTES];
        server_to_client_key.copy_from_slice(Self::field(payload.read(KEY_BYTES))?);

        Ok(ConnectToken {
            version,
            protocol_id,
            created,
            expires,
            nonce,
            private_data,
            timeout,
            addresses,
            client_to_server_key,
            server_to_client_key,
            raw: input.to_vec(),
        })
    }

    /// Decode a token from its url-safe base64 transport form.
    pub fn from_base64(input: &str) -> NetworkResult<ConnectToken> {
        let raw = base64::decode_url_safe(input)
            .map_err(|_| NetworkError::Fatal(ErrorType::InvalidToken))?;

        Self::decode(&raw)
    }

    /// Decode from either transport form: raw 2048 bytes, or url-safe base64
    /// text of those bytes.
    pub fn parse(input: &[u8]) -> NetworkResult<ConnectToken> {
        if input.len() == CONNECT_TOKEN_BYTES {
            return Self::decode(input);
        }

        match std::str::from_utf8(input) {
            Ok(text) => Self::from_base64(text.trim()),
            Err(_) => Err(NetworkError::Fatal(ErrorType::InvalidToken)),
        }
    }

    /// The url-safe base64 form used on the signaling channel.
    #[inline]
    pub fn to_base64(&self) -> String {
        base64::encode_url_safe(&self.raw)
    }

    // Any codec failure inside the fixed layout means the token is bogus, not
    // that the cursor logic misfired.
    #[inline]
    fn field<T>(result: NetworkResult<T>) -> NetworkResult<T> {
        result.map_err(|_| NetworkError::Fatal(ErrorType::InvalidToken))
    }

    fn read_address(payload: &mut Payload) -> NetworkResult<ServerAddress> {
        let address_type = Self::field(payload.read_u8())?;

        match address_type {
            ADDRESS_TYPE_IPV4 => {
                let mut octets = [0u8; 4];
                for octet in octets.iter_mut() {
                    *octet = Self::field(payload.read_u8())?;
                }
                let port = Self::field(payload.read_u16())?;

                Ok(ServerAddress {
                    host: format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]),
                    port,
                })
            }
            ADDRESS_TYPE_IPV6 => {
                let mut groups = [0u16; 8];
                for group in groups.iter_mut() {
                    *group = Self::field(payload.read_u16())?;
                }
                let port = Self::field(payload.read_u16())?;

                let host = groups
                    .iter()
                    .map(|group| format!("{:x}", group))
                    .collect::<Vec<_>>()
                    .join(":");

                Ok(ServerAddress { host, port })
            }
            // An unrecognized tag would desynchronize every field after it,
            // so the whole token is rejected.
            _ => Err(NetworkError::Fatal(ErrorType::InvalidToken)),
        }
    }
}

/// Hand-rolls a structurally valid token for state machine and socket tests.
#[cfg(test)]
pub(crate) fn build_test_token(addresses: &[(u8, &[u8], u16)], timeout: i32) -> Vec<u8> {
    let mut payload = Payload::new(CONNECT_TOKEN_BYTES);

    payload.write_string("netcode 1.02").unwrap();
    payload.write_u64(1).unwrap(); // protocol id
    payload.write_u64(1_000).unwrap(); // created
    payload.write_u64(2_000).unwrap(); // expires
    payload.write(&[7u8; NONCE_BYTES]).unwrap();
    payload.write(&[9u8; PRIVATE_BLOB_BYTES]).unwrap();
    payload.write_i32(timeout).unwrap();
    payload.write_u32(addresses.len() as u32).unwrap();

    for (kind, body, port) in addresses {
        payload.write_u8(*kind).unwrap();
        payload.write(body).unwrap();
        payload.write_u16(*port).unwrap();
    }

    payload.write(&[1u8; KEY_BYTES]).unwrap();
    payload.write(&[2u8; KEY_BYTES]).unwrap();

    let mut raw = payload.pack().to_vec();
    raw.resize(CONNECT_TOKEN_BYTES, 0);
    raw
}

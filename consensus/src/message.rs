//! Wire message codec and authentication (spec §4.2, §6).
//!
//! Every consensus message is a tuple `(code, body, view, sender, sig)`.
//! `body` is itself an RLP encoding specific to `code`; `sig` covers
//! `(code, body, view, sender)` — the signature is never part of its own
//! preimage, so that tuple has four elements, not five with a zeroed slot
//! (spec.md read literally suggests zeroing a fifth element; this is the
//! natural, unambiguous reading and is recorded as such in DESIGN.md).

use ethereum_types::H256;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use e2c_types::{Address, Block, Signature, View};

use crate::error::{Error, Result};
use crate::validator_set::ValidatorList;

/// Message codes, in the order given by spec §4.2 / §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    NewBlock = 0,
    Blame = 1,
    EquivBlame = 2,
    BlameCertificate = 3,
    Vote = 4,
    BlockCertificate = 5,
    FirstProposal = 6,
    Validate = 7,
    SecondProposal = 8,
    RequestBlock = 9,
    Respond = 10,
}

impl Code {
    fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Code::NewBlock,
            1 => Code::Blame,
            2 => Code::EquivBlame,
            3 => Code::BlameCertificate,
            4 => Code::Vote,
            5 => Code::BlockCertificate,
            6 => Code::FirstProposal,
            7 => Code::Validate,
            8 => Code::SecondProposal,
            9 => Code::RequestBlock,
            10 => Code::Respond,
            _ => return Err(Error::Decode(DecoderError::Custom("unknown message code"))),
        })
    }

    /// Request/Respond are view-agnostic (spec §4.2 step 3, §4.7).
    pub fn is_view_agnostic(self) -> bool {
        matches!(self, Code::RequestBlock | Code::Respond)
    }
}

/// A `(validator_address, signature)` pair, the unit aggregated into every
/// certificate (spec §6: "list of signatures" / "list of vote signatures"
/// / "list of validate signatures").
pub type SignatureEntry = (Address, Signature);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCertificate {
    pub block: Block,
    pub votes: Vec<SignatureEntry>,
}

impl BlockCertificate {
    /// Certificate soundness (spec §8): strictly more than F distinct valid
    /// vote signatures, all over `Vote` at `view` for `self.block`.
    pub fn verify(&self, view: View, validators: &ValidatorList) -> Result<()> {
        verify_signature_entries(&self.votes, Code::Vote, &rlp::encode(&self.block), view, validators)
    }
}

/// The body carried by every message code (spec §6's body table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    NewBlock(Block),
    Blame,
    EquivBlame {
        block1: Block,
        block2: Block,
    },
    BlameCertificate(Vec<SignatureEntry>),
    Vote(Block),
    BlockCertificate(BlockCertificate),
    FirstProposal {
        certificate: BlockCertificate,
        block: Block,
    },
    Validate,
    SecondProposal {
        validates: Vec<SignatureEntry>,
        block: Block,
    },
    RequestBlock(H256),
    Respond(Block),
}

impl Body {
    pub fn code(&self) -> Code {
        match self {
            Body::NewBlock(_) => Code::NewBlock,
            Body::Blame => Code::Blame,
            Body::EquivBlame {
                ..
            } => Code::EquivBlame,
            Body::BlameCertificate(_) => Code::BlameCertificate,
            Body::Vote(_) => Code::Vote,
            Body::BlockCertificate(_) => Code::BlockCertificate,
            Body::FirstProposal {
                ..
            } => Code::FirstProposal,
            Body::Validate => Code::Validate,
            Body::SecondProposal {
                ..
            } => Code::SecondProposal,
            Body::RequestBlock(_) => Code::RequestBlock,
            Body::Respond(_) => Code::Respond,
        }
    }

    /// Canonical byte encoding of the body alone, used both on the wire and
    /// as input to `sig_hash`.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Body::NewBlock(b) | Body::Respond(b) | Body::Vote(b) => rlp::encode(b).to_vec(),
            Body::Blame | Body::Validate => Vec::new(),
            Body::EquivBlame {
                block1,
                block2,
            } => {
                let mut s = RlpStream::new_list(2);
                s.append(block1);
                s.append(block2);
                s.out().to_vec()
            }
            Body::BlameCertificate(entries) => encode_entries(entries),
            Body::BlockCertificate(cert) => {
                let mut s = RlpStream::new_list(2);
                s.append(&cert.block);
                s.append_raw(&encode_entries(&cert.votes), 1);
                s.out().to_vec()
            }
            Body::FirstProposal {
                certificate,
                block,
            } => {
                let mut s = RlpStream::new_list(2);
                s.append_raw(&Body::BlockCertificate(certificate.clone()).encode(), 1);
                s.append(block);
                s.out().to_vec()
            }
            Body::SecondProposal {
                validates,
                block,
            } => {
                let mut s = RlpStream::new_list(2);
                s.append_raw(&encode_entries(validates), 1);
                s.append(block);
                s.out().to_vec()
            }
            Body::RequestBlock(hash) => rlp::encode(hash).to_vec(),
        }
    }

    fn decode(code: Code, bytes: &[u8]) -> Result<Self> {
        Ok(match code {
            Code::NewBlock => Body::NewBlock(rlp::decode(bytes)?),
            Code::Blame => Body::Blame,
            Code::EquivBlame => {
                let rlp = Rlp::new(bytes);
                Body::EquivBlame {
                    block1: rlp.val_at(0)?,
                    block2: rlp.val_at(1)?,
                }
            }
            Code::BlameCertificate => Body::BlameCertificate(decode_entries(bytes)?),
            Code::Vote => Body::Vote(rlp::decode(bytes)?),
            Code::BlockCertificate => Body::BlockCertificate(decode_block_certificate(bytes)?),
            Code::FirstProposal => {
                let rlp = Rlp::new(bytes);
                let cert_bytes = rlp.at(0)?.as_raw();
                let certificate = decode_block_certificate(cert_bytes)?;
                Body::FirstProposal {
                    certificate,
                    block: rlp.val_at(1)?,
                }
            }
            Code::Validate => Body::Validate,
            Code::SecondProposal => {
                let rlp = Rlp::new(bytes);
                let validates = decode_entries(rlp.at(0)?.as_raw())?;
                Body::SecondProposal {
                    validates,
                    block: rlp.val_at(1)?,
                }
            }
            Code::RequestBlock => Body::RequestBlock(rlp::decode(bytes)?),
            Code::Respond => Body::Respond(rlp::decode(bytes)?),
        })
    }
}

fn encode_entries(entries: &[SignatureEntry]) -> Vec<u8> {
    let mut s = RlpStream::new_list(entries.len());
    for (addr, sig) in entries {
        s.begin_list(2);
        s.append(addr);
        s.append(&sig.as_ref());
    }
    s.out().to_vec()
}

fn decode_entries(bytes: &[u8]) -> Result<Vec<SignatureEntry>> {
    let rlp = Rlp::new(bytes);
    let mut out = Vec::with_capacity(rlp.item_count()?);
    for item in rlp.iter() {
        let addr: Address = item.val_at(0)?;
        let sig_bytes: Vec<u8> = item.val_at(1)?;
        if sig_bytes.len() != 65 {
            return Err(Error::Decode(DecoderError::Custom("signature must be 65 bytes")));
        }
        let mut sig = [0u8; 65];
        sig.copy_from_slice(&sig_bytes);
        out.push((addr, sig));
    }
    Ok(out)
}

fn decode_block_certificate(bytes: &[u8]) -> Result<BlockCertificate> {
    let rlp = Rlp::new(bytes);
    let block = rlp.val_at(0)?;
    let votes = decode_entries(rlp.at(1)?.as_raw())?;
    Ok(BlockCertificate {
        block,
        votes,
    })
}

/// A fully authenticated message as delivered to the core's event loop:
/// decoded, signature-checked, and view-checked (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: Body,
    pub view: View,
    pub sender: Address,
    pub signature: Signature,
}

impl Message {
    /// Builds an unsigned message; call [`Message::sign`] before sending.
    pub fn new(body: Body, view: View, sender: Address) -> Self {
        Message {
            body,
            view,
            sender,
            signature: [0u8; 65],
        }
    }

    /// The preimage covered by the signature: `(code, body, view, sender)`.
    pub fn sig_hash(&self) -> H256 {
        sig_hash(self.body.code(), &self.body.encode(), self.view, &self.sender)
    }

    pub fn sign(mut self, sign: impl FnOnce(H256) -> Signature) -> Self {
        self.signature = sign(self.sig_hash());
        self
    }

    /// Decode + authenticate steps 1-3 of spec §4.2.
    ///
    /// `current_view` is `None` when the caller does not want the view
    /// check enforced (callers pass `Some` in all but test harnesses).
    pub fn decode_and_verify(
        frame: &WireFrame,
        validators: &ValidatorList,
        current_view: Option<View>,
    ) -> Result<Self> {
        let code = Code::from_u8(frame.code)?;
        let body = Body::decode(code, &frame.body)?;
        let message = Message {
            body,
            view: frame.view,
            sender: frame.sender,
            signature: frame.signature,
        };

        let recovered = e2c_crypto::recover(&message.signature, message.sig_hash())?;
        if recovered != message.sender {
            return Err(Error::InvalidSignature);
        }
        if !validators.contains(&message.sender) {
            return Err(Error::UnknownSender(message.sender));
        }
        if let Some(current_view) = current_view {
            if !code.is_view_agnostic() && message.view != current_view {
                return Err(Error::WrongView {
                    msg_view: message.view,
                    current_view,
                });
            }
        }
        Ok(message)
    }

    pub fn to_frame(&self) -> WireFrame {
        WireFrame {
            code: self.body.code() as u8,
            body: self.body.encode(),
            view: self.view,
            sender: self.sender,
            signature: self.signature,
        }
    }
}

fn sig_hash(code: Code, body: &[u8], view: View, sender: &Address) -> H256 {
    let mut s = RlpStream::new_list(4);
    s.append(&(code as u8));
    s.append(&body);
    s.append(&view);
    s.append(sender);
    keccak_hash::keccak(s.out())
}

/// Raw on-the-wire representation: `(code:u64, body:bytes, view:u64,
/// sender:20 bytes, sig:65 bytes)` (spec §6). Kept separate from
/// [`Message`] so decode failures (spec §7 "Decode failure") are caught
/// before any signature work happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub code: u8,
    pub body: Vec<u8>,
    pub view: View,
    pub sender: Address,
    pub signature: Signature,
}

impl Encodable for WireFrame {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&(self.code as u64));
        s.append(&self.body);
        s.append(&self.view);
        s.append(&self.sender);
        s.append(&self.signature.as_ref());
    }
}

impl Decodable for WireFrame {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, DecoderError> {
        if rlp.item_count()? != 5 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let code: u64 = rlp.val_at(0)?;
        let sig_bytes: Vec<u8> = rlp.val_at(4)?;
        if sig_bytes.len() != 65 {
            return Err(DecoderError::Custom("signature must be 65 bytes"));
        }
        let mut signature = [0u8; 65];
        signature.copy_from_slice(&sig_bytes);
        Ok(WireFrame {
            code: code as u8,
            body: rlp.val_at(1)?,
            view: rlp.val_at(2)?,
            sender: rlp.val_at(3)?,
            signature,
        })
    }
}

fn verify_signature_entries(
    entries: &[SignatureEntry],
    code: Code,
    body: &[u8],
    view: View,
    validators: &ValidatorList,
) -> Result<()> {
    let quorum = validators.quorum();
    if entries.len() < quorum {
        return Err(Error::NotEnoughSignatures {
            got: entries.len(),
            f: validators.max_faulty(),
        });
    }
    let mut seen = std::collections::HashSet::with_capacity(entries.len());
    for (addr, sig) in entries {
        if !validators.contains(addr) {
            return Err(Error::InvalidCertificateSignature);
        }
        if !seen.insert(*addr) {
            return Err(Error::InvalidCertificateSignature);
        }
        let digest = sig_hash(code, body, view, addr);
        let recovered = e2c_crypto::recover(sig, digest).map_err(|_| Error::InvalidCertificateSignature)?;
        if recovered != *addr {
            return Err(Error::InvalidCertificateSignature);
        }
    }
    Ok(())
}

/// Verifies a `BlameCertificate`'s signatures (spec §4.4 "Blame-certificate
/// verification").
pub fn verify_blame_certificate(entries: &[SignatureEntry], view: View, validators: &ValidatorList) -> Result<()> {
    verify_signature_entries(entries, Code::Blame, &[], view, validators)
}

/// Verifies a `SecondProposal`'s validate signatures (spec §4.5 stage 9).
pub fn verify_validate_entries(
    entries: &[SignatureEntry],
    view: View,
    validators: &ValidatorList,
) -> Result<()> {
    verify_signature_entries(entries, Code::Validate, &[], view, validators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2c_crypto::KeyPair;
    use e2c_types::{Block, ExtraData, Header};
    use ethereum_types::{H256 as EH256, H160};

    fn sample_block(number: u64) -> Block {
        let extra = ExtraData::new(vec![H160::from_low_u64_be(1)]);
        let header = Header::new(EH256::zero(), number, EH256::zero(), EH256::zero(), number, extra);
        Block::new(header, vec![])
    }

    #[test]
    fn new_block_round_trips_through_wire_frame() {
        let keypair = KeyPair::generate();
        let validators = ValidatorList::new(vec![keypair.address()]);
        let msg = Message::new(Body::NewBlock(sample_block(1)), 0, keypair.address())
            .sign(|digest| keypair.sign(digest).unwrap());
        let frame = msg.to_frame();
        let encoded = rlp::encode(&frame);
        let decoded_frame: WireFrame = rlp::decode(&encoded).unwrap();
        let verified = Message::decode_and_verify(&decoded_frame, &validators, Some(0)).unwrap();
        assert_eq!(verified.body, msg.body);
    }

    #[test]
    fn wrong_view_is_rejected_except_for_request_respond() {
        let keypair = KeyPair::generate();
        let validators = ValidatorList::new(vec![keypair.address()]);
        let msg = Message::new(Body::Blame, 3, keypair.address()).sign(|d| keypair.sign(d).unwrap());
        let frame = msg.to_frame();
        assert!(Message::decode_and_verify(&frame, &validators, Some(4)).is_err());

        let req = Message::new(Body::RequestBlock(EH256::zero()), 3, keypair.address())
            .sign(|d| keypair.sign(d).unwrap());
        let frame = req.to_frame();
        assert!(Message::decode_and_verify(&frame, &validators, Some(4)).is_ok());
    }

    #[test]
    fn sender_not_in_validator_set_is_rejected() {
        let keypair = KeyPair::generate();
        let other = ValidatorList::new(vec![H160::from_low_u64_be(99)]);
        let msg = Message::new(Body::Blame, 0, keypair.address()).sign(|d| keypair.sign(d).unwrap());
        let frame = msg.to_frame();
        assert!(matches!(
            Message::decode_and_verify(&frame, &other, Some(0)),
            Err(Error::UnknownSender(_))
        ));
    }

    #[test]
    fn certificate_below_quorum_is_rejected() {
        let keypairs: Vec<_> = (0..4).map(|_| KeyPair::generate()).collect();
        let validators = ValidatorList::new(keypairs.iter().map(|k| k.address()).collect());
        let entries: Vec<SignatureEntry> = keypairs
            .iter()
            .take(1)
            .map(|k| {
                let digest = sig_hash(Code::Blame, &[], 0, &k.address());
                (k.address(), k.sign(digest).unwrap())
            })
            .collect();
        assert!(matches!(
            verify_blame_certificate(&entries, 0, &validators),
            Err(Error::NotEnoughSignatures {
                ..
            })
        ));
    }

    #[test]
    fn certificate_at_quorum_with_distinct_signers_verifies() {
        let keypairs: Vec<_> = (0..4).map(|_| KeyPair::generate()).collect();
        let validators = ValidatorList::new(keypairs.iter().map(|k| k.address()).collect());
        let entries: Vec<SignatureEntry> = keypairs
            .iter()
            .take(2)
            .map(|k| {
                let digest = sig_hash(Code::Blame, &[], 0, &k.address());
                (k.address(), k.sign(digest).unwrap())
            })
            .collect();
        assert!(verify_blame_certificate(&entries, 0, &validators).is_ok());
    }
}

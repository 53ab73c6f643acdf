use nym_threshold_credentials::{
    attribute_from_canonical_bytes, hash_to_scalar, CredentialError, PrivateAttribute,
    PublicAttribute,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const VOUCHER_INFO_TYPE: &str = "BandwidthVoucher";

// serial number and binding number
pub const PRIVATE_ATTRIBUTES: u32 = 2;
// voucher value and voucher type
pub const PUBLIC_ATTRIBUTES: u32 = 2;

/// Private attribute as supplied by the holder. A plain string is hashed onto the scalar
/// field, while `{"scalar": "<bs58>"}` carries an already encoded field element.
#[derive(Clone, PartialEq, Eq, Zeroize, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrivateAttributeInput {
    Plain(String),
    Scalar { scalar: String },
}

impl PrivateAttributeInput {
    pub fn scalar(attribute: &PrivateAttribute) -> Self {
        PrivateAttributeInput::Scalar {
            scalar: bs58::encode(attribute.to_bytes()).into_string(),
        }
    }

    pub fn to_attribute(&self) -> Result<PrivateAttribute, CredentialError> {
        match self {
            PrivateAttributeInput::Plain(plain) => Ok(hash_to_scalar(plain)),
            PrivateAttributeInput::Scalar { scalar } => {
                let bytes = bs58::decode(scalar).into_vec().map_err(|err| {
                    CredentialError::Commitment(format!("malformed attribute encoding: {err}"))
                })?;
                attribute_from_canonical_bytes(&bytes)
            }
        }
    }
}

impl Debug for PrivateAttributeInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

impl From<String> for PrivateAttributeInput {
    fn from(plain: String) -> Self {
        PrivateAttributeInput::Plain(plain)
    }
}

impl From<&str> for PrivateAttributeInput {
    fn from(plain: &str) -> Self {
        PrivateAttributeInput::Plain(plain.to_string())
    }
}

/// Attributes of a single credential. Public attributes are always plain strings hashed
/// onto the scalar field; the first private attribute acts as the serial number.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct CredentialAttributes {
    private_attributes: Vec<PrivateAttributeInput>,

    #[zeroize(skip)]
    public_attributes_plain: Vec<String>,
}

impl Debug for CredentialAttributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAttributes")
            .field("private_attributes", &"<redacted>")
            .field("public_attributes_plain", &self.public_attributes_plain)
            .finish()
    }
}

impl CredentialAttributes {
    pub fn new(
        private_attributes_plain: Vec<String>,
        public_attributes_plain: Vec<String>,
    ) -> Self {
        Self::from_inputs(
            private_attributes_plain.into_iter().map(Into::into).collect(),
            public_attributes_plain,
        )
    }

    pub fn from_inputs(
        private_attributes: Vec<PrivateAttributeInput>,
        public_attributes_plain: Vec<String>,
    ) -> Self {
        CredentialAttributes {
            private_attributes,
            public_attributes_plain,
        }
    }

    /// Fails with [`CredentialError::Commitment`] if an encoded attribute is not a
    /// canonical field element.
    pub fn private_attributes(&self) -> Result<Vec<PrivateAttribute>, CredentialError> {
        self.private_attributes
            .iter()
            .map(PrivateAttributeInput::to_attribute)
            .collect()
    }

    pub fn public_attributes(&self) -> Vec<PublicAttribute> {
        hash_public_attributes(&self.public_attributes_plain)
    }

    pub fn public_attributes_plain(&self) -> &[String] {
        &self.public_attributes_plain
    }

    pub fn num_private_attributes(&self) -> usize {
        self.private_attributes.len()
    }

    pub fn num_attributes(&self) -> usize {
        self.private_attributes.len() + self.public_attributes_plain.len()
    }
}

pub fn hash_public_attributes<S: AsRef<str>>(plain: &[S]) -> Vec<PublicAttribute> {
    plain
        .iter()
        .map(|attribute| hash_to_scalar(attribute.as_ref()))
        .collect()
}

/// Bandwidth voucher: private serial and binding numbers, public value and type.
#[derive(Debug, Clone)]
pub struct BandwidthVoucher {
    value: u64,
    attributes: CredentialAttributes,
}

impl BandwidthVoucher {
    pub fn new<S: Into<String>>(serial_number: S, binding_number: S, value: u64) -> Self {
        BandwidthVoucher {
            value,
            attributes: CredentialAttributes::new(
                vec![serial_number.into(), binding_number.into()],
                vec![value.to_string(), VOUCHER_INFO_TYPE.to_string()],
            ),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn attributes(&self) -> &CredentialAttributes {
        &self.attributes
    }

    pub fn into_attributes(self) -> CredentialAttributes {
        self.attributes
    }

    /// Checks the public attributes describe a bandwidth voucher and returns its value.
    pub fn validate_public_attributes<S: AsRef<str>>(public_attributes_plain: &[S]) -> Option<u64> {
        let [value, typ] = public_attributes_plain else {
            return None;
        };
        if typ.as_ref() != VOUCHER_INFO_TYPE {
            return None;
        }
        value.as_ref().parse().ok()
    }
}

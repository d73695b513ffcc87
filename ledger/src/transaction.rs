//! Wire form of signed transactions.
//!
//! `sendTransaction` takes the bincode serialization of a legacy
//! transaction, `compact(sig count) || signatures || message`, as base64.

use base64::Engine;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// A transaction that could not be serialized.
#[derive(Debug, thiserror::Error)]
#[error("Cannot encode transaction: {0}")]
pub struct WireError(#[from] bincode::Error);

/// The transaction id: the fee payer's signature.
pub fn transaction_id(transaction: &Transaction) -> Signature {
    transaction.signatures.first().copied().unwrap_or_default()
}

/// Wire form encoded for `sendTransaction`.
pub fn to_base64(transaction: &Transaction) -> Result<String, WireError> {
    let bytes = bincode::serialize(transaction)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::message::Message;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::{Keypair, Signer};

    fn signed(payer: &Keypair) -> Transaction {
        let ix = Instruction::new_with_bytes(
            Pubkey::new_from_array([9; 32]),
            &[42],
            vec![
                AccountMeta::new(payer.pubkey(), true),
                AccountMeta::new(Pubkey::new_from_array([2; 32]), false),
            ],
        );
        let blockhash = Hash::new_from_array([5; 32]);
        let message = Message::new_with_blockhash(&[ix], Some(&payer.pubkey()), &blockhash);
        let mut tx = Transaction::new_unsigned(message);
        tx.try_partial_sign(&[payer], blockhash).unwrap();
        tx
    }

    #[test]
    fn test_id_is_fee_payer_signature() {
        let payer = Keypair::new();
        let tx = signed(&payer);
        assert_eq!(transaction_id(&tx), tx.signatures[0]);
        assert_ne!(transaction_id(&tx), Signature::default());
    }

    #[test]
    fn test_wire_layout() {
        let payer = Keypair::new();
        let tx = signed(&payer);

        let b64 = to_base64(&tx).unwrap();
        let wire = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .unwrap();
        let message = tx.message.serialize();

        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], tx.signatures[0].as_ref());
        assert_eq!(&wire[65..], message.as_slice());
    }
}

//! Marketplace program instructions.
//!
//! The program exposes two instructions:
//! - `mint_video(name, price_in_sol: f64, description, uri)` creates a
//!   `Video` record account, signed by the new account and the creator
//! - `pay_to_play()` moves the record's price from the player to the creator

use anchor_lang::{AnchorDeserialize, Discriminator, InstructionData};
use vidmarket_ledger::{system_program, AccountMeta, Instruction, Pubkey};

use crate::instruction::{MintVideo, PayToPlay};
use crate::state::Video;

/// Deployed marketplace program.
pub const DEFAULT_PROGRAM_ID: &str = "4WpWUh3unfvEHRfmiRMDgRxcvMAaZ5hCn16KaVMDoy8x";

/// Bytes allocated for each `Video` account.
pub const VIDEO_ACCOUNT_SPACE: usize = Video::LEN;

/// Custom error codes raised by the program.
pub const ERROR_INSUFFICIENT_FUNDS: u32 = 6000;
pub const ERROR_INVALID_URI: u32 = 6001;

/// A decoded marketplace instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketInstruction {
    MintVideo(MintVideo),
    PayToPlay,
}

/// Errors decoding instruction data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstructionDecodeError {
    #[error("Unknown instruction discriminator {0}")]
    UnknownDiscriminator(String),

    #[error("Bad instruction arguments: {0}")]
    Arguments(String),
}

impl MarketInstruction {
    pub fn decode(data: &[u8]) -> Result<Self, InstructionDecodeError> {
        let (tag, args) = data.split_at(data.len().min(8));

        if tag == MintVideo::DISCRIMINATOR {
            MintVideo::try_from_slice(args)
                .map(MarketInstruction::MintVideo)
                .map_err(|e| InstructionDecodeError::Arguments(e.to_string()))
        } else if tag == PayToPlay::DISCRIMINATOR {
            Ok(MarketInstruction::PayToPlay)
        } else {
            Err(InstructionDecodeError::UnknownDiscriminator(hex::encode(tag)))
        }
    }
}

/// Everything needed to pay for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub record: Pubkey,
    pub creator: Pubkey,
    pub viewer: Pubkey,
    /// Price the viewer saw; the program charges the on-ledger price
    pub price_minor: u64,
}

/// Build `mint_video`. Both `record` and `creator` must sign.
pub fn mint_video_instruction(
    program_id: &Pubkey,
    record: &Pubkey,
    creator: &Pubkey,
    args: &MintVideo,
) -> Instruction {
    Instruction::new_with_bytes(
        *program_id,
        &args.data(),
        vec![
            AccountMeta::new(*record, true),
            AccountMeta::new(*creator, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Build `pay_to_play`. Only the viewer signs.
pub fn pay_to_play_instruction(program_id: &Pubkey, intent: &PaymentIntent) -> Instruction {
    Instruction::new_with_bytes(
        *program_id,
        &PayToPlay {}.data(),
        vec![
            AccountMeta::new(intent.record, false),
            AccountMeta::new(intent.viewer, true),
            AccountMeta::new(intent.creator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

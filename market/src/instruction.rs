//! Instruction data for the marketplace program.
//!
//! Each struct serializes as its 8-byte discriminator followed by the
//! Borsh-encoded arguments, as the program's handlers expect.

use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData};

/// `mint_video(name, price_in_sol, description, uri)`
#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq)]
pub struct MintVideo {
    pub name: String,
    /// Price in display units; the program truncates `price_in_sol * 1e9`
    pub price_in_sol: f64,
    pub description: String,
    pub uri: String,
}

impl Discriminator for MintVideo {
    // sha256("global:mint_video")[..8]
    const DISCRIMINATOR: &'static [u8] = &[0x96, 0x77, 0x18, 0x7a, 0xa5, 0xc3, 0x6f, 0x02];
}

impl InstructionData for MintVideo {}

/// `pay_to_play()`
#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PayToPlay {}

impl Discriminator for PayToPlay {
    // sha256("global:pay_to_play")[..8]
    const DISCRIMINATOR: &'static [u8] = &[0xb7, 0xa5, 0x74, 0xe3, 0x2e, 0xb0, 0x06, 0x80];
}

impl InstructionData for PayToPlay {}

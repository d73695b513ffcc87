use anchor_lang::prelude::*;

/// Video record account written by `mint_video`
#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct Video {
    /// Title shown in the catalog
    pub name: String,

    /// Price in lamports
    pub price: u64,

    pub description: String,

    /// Media location, usually an IPFS gateway URL
    pub uri: String,

    /// Who gets paid on `pay_to_play`
    pub creator: Pubkey,
}

impl Video {
    /// Bytes the program allocates for each account
    /// Discriminator (8) + name (64) + price (8) + description (256) + uri (256)
    pub const LEN: usize = 8 + 64 + 8 + 256 + 256;
}

//! Contract bindings for the booster drop factory, fee wrapper and drops.

use alloy_core::sol;

sol! {
    /// Token economics of a booster drop, 18-decimal fixed point.
    struct DropConfig {
        uint256 tokensPerMint;
        uint256 commonOffer;
        uint256 rareOffer;
        uint256 epicOffer;
        uint256 legendaryOffer;
        uint256 mythicOffer;
        string baseURI;
    }

    /// Factory that deploys a booster drop together with its token.
    interface IBoosterDropFactory {
        event DropCreated(
            address indexed dropContract,
            address indexed tokenContract,
            address indexed owner
        );

        function createDropWithConfig(
            string tokenName,
            string tokenSymbol,
            string nftName,
            string nftSymbol,
            address owner,
            uint256 packAmount,
            DropConfig config
        ) external returns (address tokenContract, address dropContract);
    }

    /// Wrapper that forwards a factory call and charges a protocol fee.
    interface IFeeWrapper {
        function protocolFee() external view returns (uint256);

        function deployWithFee(bytes data) external payable returns (address tokenContract, address dropContract);
    }

    /// A deployed booster drop.
    interface IBoosterDrop {
        function getMintPrice(uint256 amount) external view returns (uint256);

        function mint(uint256 amount, address recipient, address referrer, address originReferrer) external payable;

        function sellAndClaimOffer(uint256 tokenId) external;

        function open(uint256[] tokenIds) external;
    }

    /// The ERC-20 paired with a drop, traded on its bonding curve.
    interface IBoosterToken {
        function buy(uint256 minTokensOut) external payable;

        function sell(uint256 tokenAmount, uint256 minEthOut) external;
    }
}

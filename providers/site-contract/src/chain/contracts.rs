use alloy::sol;

sol! {
    /// Factory that deploys one clone of the site contract per site.
    #[derive(Debug)]
    #[sol(rpc)]
    contract OrbiterFactory {
        event CloneCreated(address cloneAddress);

        function createOrbiterSite() external;
    }
}

sol! {
    /// Per-site contract holding the current content mapping.
    #[derive(Debug)]
    #[sol(rpc)]
    contract OrbiterSite {
        function updateMapping(string memory cid) external;
    }
}

//! Standalone browser deployer: one HTML file with the artifact inlined that
//! deploys through an injected wallet such as MetaMask.

use crate::artifact::Artifact;
use alloy::primitives::{
    Address,
    address,
};
use anyhow::{
    Context,
    Result,
};
use generated_abi::networks::{
    BASE_MAINNET_CHAIN_ID,
    BASE_MAINNET_USDC,
    BASE_SEPOLIA_CHAIN_ID,
    BASE_SEPOLIA_KEY_HASH,
    BASE_SEPOLIA_USDC,
    BASE_SEPOLIA_VRF_COORDINATOR,
    DEFAULT_MAINNET_RPC_URL,
    DEFAULT_SEPOLIA_RPC_URL,
    DEFAULT_VRF_SUBSCRIPTION_ID,
};
use std::{
    fs,
    path::Path,
};

pub const DEFAULT_OUTPUT: &str = "deployer.html";

/// Chainlink VRF has no Base mainnet lane yet; the deployer prefills this and
/// the sepolia key hash so the form is complete, and the operator overrides both.
pub const BASE_MAINNET_VRF_PLACEHOLDER: Address =
    address!("08e9C878321F3C8e28D8Cb65f1F02d62437BC984");

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>FortuneSkylines Deployer</title>
    <script type="importmap">
    { "imports": { "viem": "https://esm.sh/viem@2.30.0" } }
    </script>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 700px; margin: 20px auto; padding: 20px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); min-height: 100vh; }
        .container { background: white; padding: 40px; border-radius: 20px; box-shadow: 0 20px 60px rgba(0,0,0,0.3); }
        h1 { color: #333; margin-bottom: 30px; text-align: center; }
        label { display: block; margin: 15px 0 5px; color: #555; font-weight: 600; }
        input, select { width: 100%; padding: 15px; margin: 5px 0; border: 2px solid #e0e0e0; border-radius: 10px; font-size: 14px; box-sizing: border-box; }
        button { width: 100%; padding: 18px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; border: none; border-radius: 10px; font-size: 16px; font-weight: 600; cursor: pointer; margin-top: 20px; }
        button:disabled { background: #ccc; cursor: not-allowed; }
        .status { margin-top: 25px; padding: 20px; border-radius: 10px; border-left: 5px solid #4caf50; background: #f1f8f4; color: #2e7d32; }
        .error { border-left-color: #f44336; background: #fef5f5; color: #c62828; }
        code { background: #f5f5f5; padding: 3px 8px; border-radius: 5px; font-size: 13px; word-break: break-all; display: block; margin-top: 10px; }
    </style>
</head>
<body>
    <div class="container">
        <h1>FortuneSkylines Deployer</h1>

        <label>Network:</label>
        <select id="network">
            <option value="baseSepolia">Base Sepolia Testnet</option>
            <option value="base">Base Mainnet</option>
        </select>

        <label>USDC Token Address:</label>
        <input type="text" id="usdcAddress" value="__SEPOLIA_USDC__">

        <label>VRF Coordinator:</label>
        <input type="text" id="vrfCoordinator" value="__SEPOLIA_VRF__">

        <label>Key Hash:</label>
        <input type="text" id="keyHash" value="__KEY_HASH__">

        <label>Subscription ID:</label>
        <input type="number" id="subscriptionId" value="__SUBSCRIPTION_ID__">

        <label>Genesis Referrer Address:</label>
        <input type="text" id="genesisReferrer" placeholder="0x...">

        <button onclick="connectWallet()" id="connectBtn">Connect Wallet</button>
        <button onclick="deploy()" id="deployBtn" disabled>Deploy Contract</button>

        <div id="status"></div>
    </div>

    <script type="module">
        import { createWalletClient, createPublicClient, custom, http, defineChain } from 'viem';

        const BYTECODE = '__BYTECODE__';
        const ABI = __ABI__;

        const networkConfigs = {
            baseSepolia: { usdc: '__SEPOLIA_USDC__', vrf: '__SEPOLIA_VRF__', keyHash: '__KEY_HASH__' },
            base: { usdc: '__MAINNET_USDC__', vrf: '__MAINNET_VRF__', keyHash: '__KEY_HASH__' }
        };

        document.getElementById('network').addEventListener('change', function () {
            const config = networkConfigs[this.value];
            if (config) {
                document.getElementById('usdcAddress').value = config.usdc;
                document.getElementById('vrfCoordinator').value = config.vrf;
                document.getElementById('keyHash').value = config.keyHash;
            }
        });

        const chainDefinition = (id, name, rpcUrl, explorer) => defineChain({
            id,
            name,
            nativeCurrency: { name: 'Ether', symbol: 'ETH', decimals: 18 },
            rpcUrls: { default: { http: [rpcUrl] } },
            blockExplorers: { default: { name: 'BaseScan', url: explorer } },
        });

        const networks = {
            baseSepolia: {
                chain: chainDefinition(__SEPOLIA_CHAIN_ID__, 'Base Sepolia', '__SEPOLIA_RPC__', 'https://sepolia.basescan.org'),
                chainId: __SEPOLIA_CHAIN_ID__n,
                rpcUrl: '__SEPOLIA_RPC__',
                name: 'Base Sepolia'
            },
            base: {
                chain: chainDefinition(__MAINNET_CHAIN_ID__, 'Base', '__MAINNET_RPC__', 'https://basescan.org'),
                chainId: __MAINNET_CHAIN_ID__n,
                rpcUrl: '__MAINNET_RPC__',
                name: 'Base Mainnet'
            }
        };

        const status = (html, isError) => {
            document.getElementById('status').innerHTML =
                '<div class="status' + (isError ? ' error' : '') + '">' + html + '</div>';
        };

        let walletClient, publicClient, currentAccount;

        window.connectWallet = async () => {
            try {
                const network = networks[document.getElementById('network').value];
                if (!window.ethereum) {
                    throw new Error('No browser wallet found. Please install MetaMask.');
                }

                const accounts = await window.ethereum.request({ method: 'eth_requestAccounts' });
                currentAccount = accounts[0];

                const chainHex = '0x' + network.chainId.toString(16);
                const chainId = await window.ethereum.request({ method: 'eth_chainId' });
                if (parseInt(chainId, 16) !== Number(network.chainId)) {
                    try {
                        await window.ethereum.request({
                            method: 'wallet_switchEthereumChain',
                            params: [{ chainId: chainHex }],
                        });
                    } catch (err) {
                        await window.ethereum.request({
                            method: 'wallet_addEthereumChain',
                            params: [{
                                chainId: chainHex,
                                chainName: network.name,
                                rpcUrls: [network.rpcUrl],
                                nativeCurrency: { name: 'ETH', symbol: 'ETH', decimals: 18 }
                            }]
                        });
                    }
                }

                walletClient = createWalletClient({
                    account: currentAccount,
                    chain: network.chain,
                    transport: custom(window.ethereum)
                });
                publicClient = createPublicClient({ transport: http(network.rpcUrl) });

                status('Connected: <code>' + currentAccount.slice(0, 6) + '...' + currentAccount.slice(-4) + '</code>');
                document.getElementById('connectBtn').disabled = true;
                document.getElementById('deployBtn').disabled = false;
            } catch (error) {
                status(error.message, true);
            }
        };

        window.deploy = async () => {
            try {
                if (!walletClient) throw new Error('Please connect wallet first!');

                const usdcAddress = document.getElementById('usdcAddress').value;
                const vrfCoordinator = document.getElementById('vrfCoordinator').value;
                const keyHash = document.getElementById('keyHash').value;
                const subscriptionId = BigInt(document.getElementById('subscriptionId').value);
                const genesisReferrer = document.getElementById('genesisReferrer').value || currentAccount;

                status('Sending transaction... Please confirm in your wallet');
                const hash = await walletClient.deployContract({
                    abi: ABI,
                    bytecode: BYTECODE,
                    args: [usdcAddress, vrfCoordinator, keyHash, subscriptionId, genesisReferrer]
                });

                status('Waiting for confirmation...');
                const receipt = await publicClient.waitForTransactionReceipt({ hash });
                status('Deployed successfully!<br><br>Contract Address:<code>' + receipt.contractAddress + '</code>');
            } catch (error) {
                status(error.message, true);
                console.error(error);
            }
        };
    </script>
</body>
</html>
"#;

/// JSON inlined into a `<script>` must not close the tag early.
fn script_safe_json(artifact: &Artifact) -> Result<String> {
    let json = serde_json::to_string(&artifact.abi).context("serializing abi")?;
    Ok(json.replace("</", "<\\/"))
}

pub fn render_deployer(artifact: &Artifact) -> Result<String> {
    let abi = script_safe_json(artifact)?;
    let page = TEMPLATE
        .replace("__BYTECODE__", &artifact.bytecode)
        .replace("__ABI__", &abi)
        .replace("__SEPOLIA_USDC__", &BASE_SEPOLIA_USDC.to_string())
        .replace("__SEPOLIA_VRF__", &BASE_SEPOLIA_VRF_COORDINATOR.to_string())
        .replace("__KEY_HASH__", &BASE_SEPOLIA_KEY_HASH.to_string())
        .replace("__SUBSCRIPTION_ID__", &DEFAULT_VRF_SUBSCRIPTION_ID.to_string())
        .replace("__MAINNET_USDC__", &BASE_MAINNET_USDC.to_string())
        .replace("__MAINNET_VRF__", &BASE_MAINNET_VRF_PLACEHOLDER.to_string())
        .replace("__SEPOLIA_CHAIN_ID__", &BASE_SEPOLIA_CHAIN_ID.to_string())
        .replace("__MAINNET_CHAIN_ID__", &BASE_MAINNET_CHAIN_ID.to_string())
        .replace("__SEPOLIA_RPC__", DEFAULT_SEPOLIA_RPC_URL)
        .replace("__MAINNET_RPC__", DEFAULT_MAINNET_RPC_URL);
    Ok(page)
}

pub fn write_deployer(artifact: &Artifact, output: impl AsRef<Path>) -> Result<()> {
    let output = output.as_ref();
    let page = render_deployer(artifact)?;
    fs::write(output, page).with_context(|| format!("writing {}", output.display()))
}

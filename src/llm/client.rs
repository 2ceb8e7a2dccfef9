use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Offline client used for dry runs and tests. Answers the way a chat model
/// usually does: a reasoning trace, some prose, then a fenced test file.
pub struct MockLlmClient;

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self
    }

    fn contract_name(prompt: &str) -> &str {
        prompt
            .split_whitespace()
            .skip_while(|word| *word != "contract")
            .nth(1)
            .map(|name| name.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_'))
            .filter(|name| !name.is_empty())
            .unwrap_or("Contract")
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let name = Self::contract_name(prompt);
        Ok(format!(
            r#"<think>
The contract is {name}. Cover deployment first, then ownership.
</think>

Here is a Hardhat test suite for `{name}`:

```javascript
const {{ expect }} = require("chai");
const {{ ethers }} = require("hardhat");

describe("{name}", function () {{
  async function deploy() {{
    const [owner, other] = await ethers.getSigners();
    const factory = await ethers.getContractFactory("{name}");
    const contract = await factory.deploy();
    return {{ contract, owner, other }};
  }}

  it("deploys", async function () {{
    const {{ contract }} = await deploy();
    expect(await contract.getAddress()).to.be.properAddress;
  }});
}});
```

Run it with `npx hardhat test`."#
        ))
    }
}

// 8.8 clearing_house/governance.rs: parameter updates. every value is validated before it lands.

use super::core::ClearingHouse;
use super::results::ClearingHouseError;
use crate::config::{ClearingHouseParams, MarketParams};
use crate::events::{EventPayload, ParameterUpdatedEvent};
use crate::types::{CollateralId, MarketId};
use rust_decimal::Decimal;

impl ClearingHouse {
    pub fn set_params(&mut self, params: ClearingHouseParams) -> Result<(), ClearingHouseError> {
        params.validate()?;
        self.params = params;
        self.emit_parameter_update(None, "clearing_house_params");
        Ok(())
    }

    pub fn set_market_params(&mut self, market_id: MarketId, params: MarketParams) -> Result<(), ClearingHouseError> {
        self.market_mut(market_id)?.set_params(params)?;
        self.emit_parameter_update(Some(market_id), "market_params");
        Ok(())
    }

    pub fn set_min_margin(&mut self, min_margin: Decimal, min_margin_at_creation: Decimal) -> Result<(), ClearingHouseError> {
        let params = ClearingHouseParams {
            min_margin,
            min_margin_at_creation,
            ..self.params.clone()
        };
        self.set_params(params)
    }

    pub fn set_insurance_fee(&mut self, market_id: MarketId, insurance_fee: Decimal) -> Result<(), ClearingHouseError> {
        let params = MarketParams {
            insurance_fee,
            ..self.market(market_id)?.params().clone()
        };
        self.set_market_params(market_id, params)
    }

    pub fn set_max_block_trade_amount(&mut self, market_id: MarketId, amount: Decimal) -> Result<(), ClearingHouseError> {
        let params = MarketParams {
            max_block_trade_amount: amount,
            ..self.market(market_id)?.params().clone()
        };
        self.set_market_params(market_id, params)
    }

    pub fn set_collateral_weight(&mut self, token: CollateralId, weight: Decimal) -> Result<(), ClearingHouseError> {
        self.state.vault.set_collateral_weight(token, weight)?;
        self.emit_parameter_update(None, "collateral_weight");
        Ok(())
    }

    fn emit_parameter_update(&mut self, market_id: Option<MarketId>, name: &str) {
        tracing::info!(market = ?market_id.map(|m| m.0), name, "parameter updated");
        self.emit_event(EventPayload::ParameterUpdated(ParameterUpdatedEvent {
            market_id,
            name: name.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::super::core::test_support::*;
    use super::super::results::ClearingHouseError;
    use crate::config::ConfigError;
    use crate::events::EventPayload;
    use rust_decimal_macros::dec;

    #[test]
    fn test_min_margin_bounds() {
        let mut ch = clearing_house();
        let result = ch.set_min_margin(dec!(0.01), dec!(0.05));
        assert!(matches!(
            result,
            Err(ClearingHouseError::Config(ConfigError::OutOfBounds { name: "min_margin", .. }))
        ));
        // creation margin must stay above maintenance
        assert!(ch.set_min_margin(dec!(0.05), dec!(0.05)).is_err());

        ch.set_min_margin(dec!(0.03), dec!(0.06)).unwrap();
        assert_eq!(ch.params().min_margin, dec!(0.03));
        assert!(matches!(
            ch.events().last().map(|e| &e.payload),
            Some(EventPayload::ParameterUpdated(_))
        ));
    }

    #[test]
    fn test_market_param_bounds() {
        let mut ch = clearing_house();
        assert!(ch.set_insurance_fee(EUR_MARKET, dec!(0.02)).is_err());
        assert!(ch.set_max_block_trade_amount(EUR_MARKET, dec!(99)).is_err());

        ch.set_insurance_fee(EUR_MARKET, dec!(0.002)).unwrap();
        assert_eq!(ch.market(EUR_MARKET).unwrap().params().insurance_fee, dec!(0.002));
    }

    #[test]
    fn test_collateral_weight_bounds() {
        let mut ch = clearing_house();
        let token = ch.add_collateral(crate::types::AssetId::new("ETH"), dec!(0.8)).unwrap();
        assert!(ch.set_collateral_weight(token, dec!(1.5)).is_err());
        ch.set_collateral_weight(token, dec!(0.5)).unwrap();
        assert_eq!(ch.vault().collateral(token).unwrap().weight, dec!(0.5));
    }
}
